use std::collections::HashMap;
use std::time::{Duration, Instant};
use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::controller::InputController;
use crate::downloads::DownloadDir;
use crate::gateway::AnalysisGateway;
use crate::state::MessageId;

/// How long the "copied" indicator stays on a message.
pub const COPY_FEEDBACK: Duration = Duration::from_secs(2);

/// Per-message "copied" indicators, each expiring on its own.
#[derive(Debug, Default)]
pub struct CopyIndicator {
    copied_at: HashMap<MessageId, Instant>,
}

impl CopyIndicator {
    pub fn mark(&mut self, id: MessageId, now: Instant) {
        self.copied_at.insert(id, now);
    }

    pub fn is_active(&self, id: MessageId, now: Instant) -> bool {
        self.copied_at
            .get(&id)
            .map(|at| now.saturating_duration_since(*at) < COPY_FEEDBACK)
            .unwrap_or(false)
    }

    /// Forget indicators that have expired.
    pub fn prune(&mut self, now: Instant) {
        self.copied_at
            .retain(|_, at| now.saturating_duration_since(*at) < COPY_FEEDBACK);
    }
}

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// The desktop clipboard. Opened per copy so a missing display only fails
/// the copy itself.
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new()?;
        clipboard.set_text(text.to_string())?;
        Ok(())
    }
}

pub struct App {
    pub should_quit: bool,
    pub controller: InputController,
    pub copied: CopyIndicator,
    clipboard: Box<dyn Clipboard>,

    // Transcript scroll state
    pub transcript_scroll: u16,
    pub follow_transcript: bool,
    pub chat_height: u16, // Inner height of the transcript area
    pub chat_width: u16,  // Inner width, for wrap estimates
    pub transcript_rows: u16, // Wrapped transcript height from the last render

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(config: &Config) -> Self {
        let gateway = AnalysisGateway::new(&config.api_url);
        let downloads = DownloadDir::new(config.resolved_download_dir());
        info!(
            api_url = %gateway.base_url(),
            downloads = %downloads.path().display(),
            "starting session"
        );

        let controller = InputController::new(gateway, Box::new(downloads));
        Self::with_parts(controller, Box::new(SystemClipboard))
    }

    pub fn with_parts(controller: InputController, clipboard: Box<dyn Clipboard>) -> Self {
        Self {
            should_quit: false,
            controller,
            copied: CopyIndicator::default(),
            clipboard,
            transcript_scroll: 0,
            follow_transcript: true,
            chat_height: 0,
            chat_width: 0,
            transcript_rows: 0,
            animation_frame: 0,
        }
    }

    /// Tick animation frame and expire copy indicators (called by Tick event)
    pub fn tick(&mut self, now: Instant) {
        if self.controller.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.copied.prune(now);
    }

    /// Apply finished requests. Keeps the newest messages in view.
    pub fn sync_requests(&mut self) {
        if self.controller.poll_settled() > 0 {
            self.follow_transcript = true;
        }
    }

    /// Copy the latest reply without a sentiment badge to the clipboard.
    pub fn copy_latest_reply(&mut self, now: Instant) -> bool {
        let Some(message) = self.controller.store().last_copyable() else {
            return false;
        };
        let (id, content) = (message.id(), message.content().to_string());

        match self.clipboard.set_text(&content) {
            Ok(()) => {
                self.copied.mark(id, now);
                true
            }
            Err(e) => {
                warn!(error = %e, "copy to clipboard failed");
                false
            }
        }
    }

    pub fn new_chat(&mut self) {
        self.controller.new_chat();
        self.transcript_scroll = 0;
        self.follow_transcript = true;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_transcript = false;
        self.transcript_scroll = self.transcript_scroll.saturating_sub(lines);
    }

    /// Scrolling past the end resumes following new messages.
    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.transcript_rows.saturating_sub(self.chat_height);
        self.transcript_scroll = self.transcript_scroll.saturating_add(lines).min(max_scroll);
        if self.transcript_scroll >= max_scroll {
            self.follow_transcript = true;
        }
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }
}
