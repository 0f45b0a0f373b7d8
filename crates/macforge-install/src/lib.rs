mod app;
mod brew;
mod fetch;
mod layout;
mod profile;
mod run;
mod toolchain;

pub use app::{
    build_dmg_attach_command, build_dmg_detach_command, bundle_installed, copy_bundle_with_ditto,
    find_bundle_on_mount, install_desktop_app, install_from_image_with_hooks,
    refresh_installed_app, DesktopApp, CLAUDE_DESKTOP,
};
pub use brew::{homebrew_prefix, homebrew_prefix_for_arch, Brew};
pub use fetch::{
    download_to_file, http_get_text, resolve_link, scrape_first_link_with_extension, Downloaded,
};
pub use layout::{expand_home, MachineLayout};
pub use profile::{append_once, brew_shellenv_snippet, nvm_init_snippet, ProfileSnippet};
pub use run::{command_succeeds, run_command, run_command_capture};
pub use toolchain::{
    ensure_node, ensure_runtime_manager, ensure_tool, ensure_uv, git_spec, probe_version,
    python_spec, NvmEnv, ToolSpec,
};
