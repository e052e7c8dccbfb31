//! Browser process and DevTools session lifecycle.
//!
//! A [`BrowserSession`] is acquired once per run and released once with
//! [`BrowserSession::close`]. The child process is also marked kill-on-drop,
//! so an early return or panic cannot leave the browser and its profile lock
//! behind.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::cdp::{CdpConnection, DevToolsHttp};
use crate::config::{DashboardConfig, SessionConfig};
use crate::errors::SessionError;
use crate::page::Page;

#[cfg(target_os = "windows")]
const BROWSER_CANDIDATES: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(target_os = "macos")]
const BROWSER_CANDIDATES: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const BROWSER_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
];

const DEVTOOLS_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The owned UI session: one browser process and one connected page.
pub struct BrowserSession {
    child: Child,
    page: Page,
    profile_dir: PathBuf,
}

impl BrowserSession {
    /// Launch the browser and connect to its first page.
    #[instrument(skip_all, fields(port = session.debug_port, headless = session.headless))]
    pub async fn launch(
        session: &SessionConfig,
        dashboard: &DashboardConfig,
    ) -> Result<Self, SessionError> {
        let browser = match &session.browser_path {
            Some(path) => path.clone(),
            None => find_browser()?,
        };

        let profile_dir = session.resolved_profile_dir();
        std::fs::create_dir_all(&profile_dir).map_err(|source| SessionError::Profile {
            path: profile_dir.display().to_string(),
            source,
        })?;

        // Never attach to a browser this run did not start.
        let http = DevToolsHttp::new(session.debug_port);
        if let Ok(existing) = http.version().await {
            return Err(SessionError::PortInUse {
                port: session.debug_port,
                browser: existing.browser,
            });
        }

        let args = launch_args(session, &profile_dir);
        info!(browser = %browser.display(), "Launching {} Chrome…", if session.headless { "headless" } else { "visible" });
        debug!(?args, "Browser arguments");

        let mut child = Command::new(&browser)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SessionError::Launch {
                path: browser.display().to_string(),
                source,
            })?;

        // From here on `child` is killed on drop if anything below fails.
        let version = wait_for_devtools(
            &http,
            &mut child,
            session.debug_port,
            session.launch_timeout(),
        )
        .await?;
        info!(browser = %version.browser, "DevTools endpoint ready");

        let target = http
            .first_page()
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?
            .ok_or(SessionError::NoPageTarget)?;
        let ws_url = target.websocket_url.ok_or(SessionError::NoPageTarget)?;

        let cdp = CdpConnection::connect(&ws_url, dashboard.command_timeout())
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        let page = Page::new(cdp, dashboard.poll_interval(), dashboard.wait_timeout());

        Ok(Self {
            child,
            page,
            profile_dir,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    /// Give the operator time to log in before any task runs.
    pub async fn login_grace(&self, wait: Duration) {
        if wait.is_zero() {
            return;
        }
        info!(
            "🔑 If first run, please log in within {} seconds…",
            wait.as_secs()
        );
        let deadline = Instant::now() + wait;
        let tick = Duration::from_secs(15);
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            tokio::time::sleep(remaining.min(tick)).await;
            let left = deadline.saturating_duration_since(Instant::now());
            if !left.is_zero() {
                debug!("Login window: {}s left", left.as_secs());
            }
        }
    }

    /// Disconnect and terminate the browser.
    pub async fn close(mut self) {
        info!("Closing Chrome…");
        self.page.close().await;
        if let Err(e) = self.child.kill().await {
            warn!("Failed to stop browser process: {}", e);
        }
    }
}

fn launch_args(session: &SessionConfig, profile_dir: &Path) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", session.debug_port),
        format!("--user-data-dir={}", profile_dir.display()),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--password-store=basic".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
    ];
    if session.headless {
        args.push("--headless=new".to_string());
    }
    args.extend(session.extra_args.iter().cloned());
    args.push("about:blank".to_string());
    args
}

fn find_browser() -> Result<PathBuf, SessionError> {
    for candidate in BROWSER_CANDIDATES {
        let path = Path::new(candidate);
        if path.is_absolute() {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
        } else if let Some(found) = search_path(candidate) {
            return Ok(found);
        }
    }
    Err(SessionError::BrowserNotFound(BROWSER_CANDIDATES.join(", ")))
}

fn search_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

async fn wait_for_devtools(
    http: &DevToolsHttp,
    child: &mut Child,
    port: u16,
    timeout: Duration,
) -> Result<crate::cdp::VersionInfo, SessionError> {
    let deadline = Instant::now() + timeout;
    loop {
        match http.version().await {
            Ok(version) => return Ok(version),
            Err(e) => {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        return Err(SessionError::BrowserExited {
                            status: status.to_string(),
                        })
                    }
                    Ok(None) => {}
                    Err(wait_err) => debug!("Could not poll browser process: {}", wait_err),
                }
                if Instant::now() >= deadline {
                    return Err(SessionError::DevToolsUnavailable {
                        port,
                        reason: e.to_string(),
                    });
                }
                debug!("DevTools not ready yet: {}", e);
            }
        }
        tokio::time::sleep(DEVTOOLS_POLL_INTERVAL).await;
    }
}
