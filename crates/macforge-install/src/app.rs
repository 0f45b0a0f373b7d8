use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::fetch::{
    download_to_file, http_get_text, resolve_link, scrape_first_link_with_extension, Downloaded,
};
use crate::layout::MachineLayout;
use crate::run::run_command;
use macforge_core::{StepOutcome, StepStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesktopApp {
    pub name: &'static str,
    /// Bundle directory under /Applications.
    pub bundle_name: &'static str,
    /// Name `open -a` and AppleScript know the app by.
    pub launch_name: &'static str,
    pub download_page: &'static str,
}

pub const CLAUDE_DESKTOP: DesktopApp = DesktopApp {
    name: "Claude Desktop",
    bundle_name: "Claude.app",
    launch_name: "Claude",
    download_page: "https://claude.ai/download",
};

pub fn bundle_installed(applications_dir: &Path, bundle_name: &str) -> bool {
    applications_dir.join(bundle_name).is_dir()
}

/// Launches an already-installed app long enough for its own updater to
/// kick off, then quits it.
pub fn refresh_installed_app(app: &DesktopApp) -> Result<()> {
    run_command(
        Command::new("open").arg("-a").arg(app.launch_name),
        &format!("failed to launch {}", app.name),
    )?;
    thread::sleep(Duration::from_secs(5));
    run_command(
        Command::new("osascript")
            .arg("-e")
            .arg(format!("quit app \"{}\"", app.launch_name)),
        &format!("failed to quit {}", app.name),
    )
}

pub fn build_dmg_attach_command(image_path: &Path, mount_point: &Path) -> Command {
    let mut command = Command::new("hdiutil");
    command
        .arg("attach")
        .arg(image_path)
        .arg("-readonly")
        .arg("-nobrowse")
        .arg("-mountpoint")
        .arg(mount_point);
    command
}

pub fn build_dmg_detach_command(mount_point: &Path) -> Command {
    let mut command = Command::new("hdiutil");
    command.arg("detach").arg(mount_point);
    command
}

/// The single `*.app` bundle at the top of the mounted image.
pub fn find_bundle_on_mount(mount_point: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(mount_point)
        .with_context(|| format!("failed to read mount point: {}", mount_point.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|v| v.to_str()) == Some("app") && path.is_dir() {
            return Ok(path);
        }
    }
    Err(anyhow!(
        "no application bundle found on mounted image at {}",
        mount_point.display()
    ))
}

pub fn copy_bundle_with_ditto(bundle_src: &Path, dest: &Path) -> Result<()> {
    run_command(
        Command::new("ditto").arg(bundle_src).arg(dest),
        "failed to copy application bundle out of the mounted image",
    )
}

/// Attach, copy the bundle into /Applications, detach. The detach always
/// runs; a copy failure and a detach failure are reported together rather
/// than one eating the other.
pub fn install_from_image_with_hooks<RunCmd, LocateBundle, CopyBundle>(
    image_path: &Path,
    mount_point: &Path,
    applications_dir: &Path,
    mut run: RunCmd,
    mut locate: LocateBundle,
    mut copy: CopyBundle,
) -> Result<PathBuf>
where
    RunCmd: FnMut(&mut Command, &str) -> Result<()>,
    LocateBundle: FnMut(&Path) -> Result<PathBuf>,
    CopyBundle: FnMut(&Path, &Path) -> Result<()>,
{
    let mut attach_command = build_dmg_attach_command(image_path, mount_point);
    run(&mut attach_command, "failed to attach disk image")?;

    let copy_result = (|| -> Result<PathBuf> {
        let bundle_src = locate(mount_point)?;
        let bundle_name = bundle_src
            .file_name()
            .ok_or_else(|| anyhow!("bundle path has no file name: {}", bundle_src.display()))?;
        let dest = applications_dir.join(bundle_name);
        copy(&bundle_src, &dest)?;
        Ok(dest)
    })();

    let mut detach_command = build_dmg_detach_command(mount_point);
    let detach_result = run(&mut detach_command, "failed to detach disk image mount");

    match (copy_result, detach_result) {
        (Ok(dest), Ok(())) => Ok(dest),
        (Err(copy_err), Ok(())) => Err(copy_err),
        (Ok(_), Err(detach_err)) => Err(detach_err),
        (Err(copy_err), Err(detach_err)) => Err(anyhow!(
            "failed to stage bundle from mounted image: {copy_err}; additionally failed to detach mount {}: {detach_err}",
            mount_point.display()
        )),
    }
}

fn stage_app_from_image(image_path: &Path, applications_dir: &Path) -> Result<PathBuf> {
    let mount_point = image_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(".macforge-dmg-mount");
    fs::create_dir_all(&mount_point)
        .with_context(|| format!("failed to create {}", mount_point.display()))?;

    let result = install_from_image_with_hooks(
        image_path,
        &mount_point,
        applications_dir,
        run_command,
        find_bundle_on_mount,
        copy_bundle_with_ditto,
    );

    let _ = fs::remove_dir_all(&mount_point);
    result
}

pub(crate) fn image_file_name_from_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    let file_name = without_query.rsplit('/').next().unwrap_or("");

    if file_name.is_empty() || file_name == "." || file_name == ".." {
        "desktop-app.dmg".to_string()
    } else {
        file_name.to_string()
    }
}

/// The full desktop application ensure-step: already installed means a
/// brief launch-and-quit refresh and no network at all; otherwise the
/// download page is scraped for the first disk-image link and the bundle is
/// staged out of the image.
pub fn install_desktop_app(
    app: &DesktopApp,
    layout: &MachineLayout,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<StepOutcome> {
    install_desktop_app_with_hooks(
        app,
        &layout.applications_dir(),
        &layout.downloads_dir(),
        http_get_text,
        |url, dest| download_to_file(url, dest, progress),
        stage_app_from_image,
        refresh_installed_app,
    )
}

pub(crate) fn install_desktop_app_with_hooks<FetchPage, Download, Stage, Refresh>(
    app: &DesktopApp,
    applications_dir: &Path,
    downloads_dir: &Path,
    mut fetch_page: FetchPage,
    mut download: Download,
    mut stage: Stage,
    mut refresh: Refresh,
) -> Result<StepOutcome>
where
    FetchPage: FnMut(&str) -> Result<String>,
    Download: FnMut(&str, &Path) -> Result<Downloaded>,
    Stage: FnMut(&Path, &Path) -> Result<PathBuf>,
    Refresh: FnMut(&DesktopApp) -> Result<()>,
{
    if bundle_installed(applications_dir, app.bundle_name) {
        let detail = match refresh(app) {
            Ok(()) => "refreshed via self-update".to_string(),
            Err(err) => format!("present; self-update refresh failed: {err:#}"),
        };
        return Ok(StepOutcome::new(
            app.name,
            StepStatus::AlreadyPresent,
            detail,
        ));
    }

    let html = fetch_page(app.download_page)?;
    let link = scrape_first_link_with_extension(&html, ".dmg").ok_or_else(|| {
        anyhow!("no disk image link found on {}", app.download_page)
    })?;
    let url = resolve_link(app.download_page, &link);

    let image_path = downloads_dir.join(image_file_name_from_url(&url));
    let downloaded = download(&url, &image_path)?;

    let staged = stage(&downloaded.path, applications_dir);
    let _ = fs::remove_file(&downloaded.path);
    let bundle = staged?;

    if !bundle.is_dir() {
        return Err(anyhow!(
            "bundle missing after copy: {}",
            bundle.display()
        ));
    }

    Ok(StepOutcome::new(
        app.name,
        StepStatus::Installed,
        format!(
            "{} ({} bytes, sha256 {})",
            bundle.display(),
            downloaded.bytes,
            &downloaded.sha256_hex[..12.min(downloaded.sha256_hex.len())]
        ),
    ))
}
