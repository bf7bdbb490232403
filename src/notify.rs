// src/notify.rs

//! Notification manager: a priority-aware queue of "bring me to
//! foreground" requests from backgrounded apps.
//!
//! Exactly one notification is current at a time. Urgent requests jump the
//! pending queue but never interrupt whatever is already on screen; the
//! current notification leaves only by timeout or explicit dismissal, at
//! which point the next queued one (if any) is promoted.

use crate::buffer::PixelBuffer;
use crate::color::Rgb;
use log::{debug, info};
use std::collections::VecDeque;
use std::time::Duration;

/// How long a promoted notification stays on screen before auto-dismissal.
pub const DISPLAY_DURATION: Duration = Duration::from_secs(5);

const MESSAGE_LINES: usize = 3;

/// Notification priority. Urgent entries are inserted at the head of the
/// pending queue; Low and Normal append in FIFO order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Normal,
    Urgent,
}

impl Priority {
    fn border_color(self) -> Rgb {
        match self {
            Priority::Low => Rgb::GREY,
            Priority::Normal => Rgb::CYAN,
            Priority::Urgent => Rgb::RED,
        }
    }
}

/// A single foreground request from a backgrounded app.
#[derive(Debug, Clone)]
pub struct Notification {
    pub app_name: String,
    pub message: String,
    pub priority: Priority,
    /// How long this notification has been current; zero while pending.
    age: Duration,
}

pub struct NotificationManager {
    current: Option<Notification>,
    pending: VecDeque<Notification>,
    display_duration: Duration,
    /// Set when the current notification changes; the scheduler merges it
    /// with the foreground app's dirty flag so the overlay repaints even
    /// when the app is idle.
    needs_redraw: bool,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        NotificationManager {
            current: None,
            pending: VecDeque::new(),
            display_duration: DISPLAY_DURATION,
            needs_redraw: false,
        }
    }

    /// Test-facing constructor with a shortened display duration.
    pub fn with_display_duration(display_duration: Duration) -> Self {
        NotificationManager {
            display_duration,
            ..Self::new()
        }
    }

    /// Enqueues a foreground request from `app_name`. Urgent priority jumps
    /// to the head of the pending queue (never preempting the current
    /// notification); others append. With nothing current the request is
    /// promoted immediately.
    pub fn request_foreground(&mut self, app_name: &str, message: &str, priority: Priority) {
        let notification = Notification {
            app_name: app_name.to_string(),
            message: message.to_string(),
            priority,
            age: Duration::ZERO,
        };
        info!(
            "NotificationManager: '{}' requests foreground ({:?})",
            app_name, priority
        );
        if self.current.is_none() {
            self.current = Some(notification);
            self.needs_redraw = true;
            return;
        }
        match priority {
            Priority::Urgent => self.pending.push_front(notification),
            _ => self.pending.push_back(notification),
        }
    }

    /// Advances display time; auto-dismisses the current notification once
    /// it has been shown for the display duration. Called once per frame.
    pub fn update(&mut self, dt: Duration) {
        let expired = match self.current.as_mut() {
            Some(current) => {
                current.age += dt;
                current.age >= self.display_duration
            }
            None => false,
        };
        if expired {
            debug!("NotificationManager: auto-dismissing expired notification");
            self.promote_next();
        }
    }

    /// Dismisses the current notification early, promoting the next queued
    /// one (if any).
    pub fn dismiss(&mut self) {
        if self.current.is_some() {
            self.promote_next();
        }
    }

    fn promote_next(&mut self) {
        self.current = self.pending.pop_front().map(|mut n| {
            n.age = Duration::ZERO;
            n
        });
        self.needs_redraw = true;
    }

    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    /// Name of the app to switch to if the user accepts the current
    /// notification.
    pub fn requesting_app(&self) -> Option<&str> {
        self.current.as_ref().map(|n| n.app_name.as_str())
    }

    /// Takes the pending redraw flag, clearing it.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    /// Paints the overlay panel for the current notification onto
    /// `buffer`. Runs after the foreground app's render so the overlay is
    /// always on top. No-op when nothing is current.
    pub fn render_overlay(&self, buffer: &mut PixelBuffer) {
        let notification = match self.current.as_ref() {
            Some(n) => n,
            None => return,
        };

        let glyph_w = buffer.font().glyph_width() as i32;
        let glyph_h = buffer.font().glyph_height() as i32;
        let width = buffer.width() as i32;

        let panel_x = 2;
        let panel_w = width - 4;
        let text_x = panel_x + 3;
        let max_cols = ((panel_w - 6) / glyph_w).max(1) as usize;
        let lines = wrap_message(&notification.message, max_cols, MESSAGE_LINES);

        // Name row + message rows + hint row, padded.
        let panel_h = (2 + lines.len() as i32) * (glyph_h + 1) + 5;
        let panel_y = 2;

        buffer.rect(panel_x, panel_y, panel_w, panel_h, Rgb::BLACK, true);
        buffer.rect(
            panel_x,
            panel_y,
            panel_w,
            panel_h,
            notification.priority.border_color(),
            false,
        );

        let mut text_y = panel_y + 3;
        buffer.text(&notification.app_name, text_x, text_y, Rgb::WHITE, None, 1);
        text_y += glyph_h + 1;
        for line in &lines {
            buffer.text(line, text_x, text_y, Rgb::GREY, None, 1);
            text_y += glyph_h + 1;
        }
        buffer.text(
            "ENTER: OPEN",
            text_x,
            text_y,
            notification.priority.border_color().dimmed(180),
            None,
            1,
        );
    }
}

/// Greedy word wrap into at most `max_lines` lines of `max_cols`
/// characters. Overlong words are split; overflow past the last line is
/// dropped.
fn wrap_message(message: &str, max_cols: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut line_cols = 0usize;
    for word in message.split_whitespace() {
        let mut word = word;
        let mut word_cols = word.chars().count();
        loop {
            if line.is_empty() && word_cols >= max_cols {
                // Split overlong words at a char boundary.
                let split = word
                    .char_indices()
                    .nth(max_cols)
                    .map(|(i, _)| i)
                    .unwrap_or(word.len());
                let (head, tail) = word.split_at(split);
                lines.push(head.to_string());
                if lines.len() == max_lines {
                    return lines;
                }
                word = tail;
                word_cols = word.chars().count();
                if word.is_empty() {
                    break;
                }
                continue;
            }
            let needed = if line.is_empty() {
                word_cols
            } else {
                line_cols + 1 + word_cols
            };
            if needed <= max_cols {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(word);
                line_cols = needed;
                break;
            }
            lines.push(std::mem::take(&mut line));
            line_cols = 0;
            if lines.len() == max_lines {
                return lines;
            }
        }
    }
    if !line.is_empty() && lines.len() < max_lines {
        lines.push(line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
