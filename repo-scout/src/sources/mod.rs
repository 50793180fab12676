pub mod github;

pub use github::GitHubSource;
