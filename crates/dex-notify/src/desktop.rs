use crate::{Notification, NotificationTransport};
use async_trait::async_trait;

/// Best-effort OS-native popup. Always reports "configured" — there is no
/// credential to check — but may no-op on an unsupported platform or a
/// headless session, in which case `send` returns `false`.
pub struct DesktopNotifier;

#[async_trait]
impl NotificationTransport for DesktopNotifier {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, notification: &Notification) -> bool {
        let title = notification.title.clone();
        let message = notification.message.clone();
        let result = tokio::task::spawn_blocking(move || send_platform_notification(&title, &message)).await;
        matches!(result, Ok(true))
    }
}

#[cfg(target_os = "linux")]
fn send_platform_notification(title: &str, message: &str) -> bool {
    std::process::Command::new("notify-send").arg(title).arg(message).status().map(|s| s.success()).unwrap_or(false)
}

#[cfg(target_os = "macos")]
fn send_platform_notification(title: &str, message: &str) -> bool {
    let script = format!(
        "display notification {:?} with title {:?}",
        message, title
    );
    std::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(target_os = "windows")]
fn send_platform_notification(title: &str, message: &str) -> bool {
    let script = format!(
        "[reflection.assembly]::loadwithpartialname('System.Windows.Forms'); \
         $n = New-Object System.Windows.Forms.NotifyIcon; \
         $n.Icon = [System.Drawing.SystemIcons]::Information; \
         $n.Visible = $true; \
         $n.ShowBalloonTip(5000, {:?}, {:?}, [System.Windows.Forms.ToolTipIcon]::Info)",
        title, message
    );
    std::process::Command::new("powershell")
        .args(["-NoProfile", "-Command", &script])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn send_platform_notification(_title: &str, _message: &str) -> bool {
    false
}
