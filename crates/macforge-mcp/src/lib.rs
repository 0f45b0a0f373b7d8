mod env_file;
mod git_ops;
mod install;

pub use env_file::{render_env_file, render_oauth_client_json, write_secrets_file};
pub use git_ops::{git_head_revision, run_git_clone, run_git_pull};
pub use install::{
    install_packaged_integration, install_repo_integration, package_listing_contains,
    PackageRuntime, RepoInstallRequest,
};

#[cfg(test)]
mod tests;
