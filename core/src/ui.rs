//! Output buffering between the running story and the host.

use crate::host::{Order, StreamTarget};

pub const WINDOW_MAIN: u16 = 0;
pub const WINDOW_UPPER: u16 = 1;

pub trait Ui {
    /// Drop all buffered output and window state (called on restart).
    fn reset(&mut self);
    fn print(&mut self, text: &str);
    fn set_window(&mut self, window: u16);
    fn split_window(&mut self, lines: u16);
    fn erase_window(&mut self, window: i16);
    fn erase_line(&mut self);
    fn set_cursor(&mut self, row: u16, col: u16);
    fn cursor(&self) -> (u16, u16);
    fn set_style(&mut self, style: u16);
    fn set_colour(&mut self, foreground: u16, background: u16);
    /// Pending main-window orders, in emission order.
    fn flush(&mut self) -> Vec<Order>;
    /// Status line text accumulated since the last call, if any.
    fn take_status(&mut self) -> Option<String>;
}

/// Default UI: coalesces main-window text into style runs and collects
/// upper-window text as the status line.
#[derive(Debug, Clone, Default)]
pub struct BufferedUi {
    orders: Vec<Order>,
    run: String,
    run_style: u16,
    style: u16,
    window: u16,
    status: String,
    cursor: (u16, u16),
}

impl BufferedUi {
    pub fn new() -> Self {
        Self {
            cursor: (1, 1),
            ..Self::default()
        }
    }

    fn close_run(&mut self) {
        if self.run.is_empty() {
            return;
        }
        self.orders.push(Order::Stream {
            to: StreamTarget::Main,
            text: std::mem::take(&mut self.run),
            style: self.run_style,
        });
    }
}

impl Ui for BufferedUi {
    fn reset(&mut self) {
        *self = BufferedUi::new();
    }

    fn print(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.window == WINDOW_UPPER {
            self.status.push_str(text);
            self.cursor.1 = self.cursor.1.saturating_add(text.chars().count() as u16);
            return;
        }
        if self.style != self.run_style {
            self.close_run();
            self.run_style = self.style;
        }
        self.run.push_str(text);
    }

    fn set_window(&mut self, window: u16) {
        self.window = window;
        if window == WINDOW_UPPER {
            self.cursor = (1, 1);
        }
    }

    fn split_window(&mut self, lines: u16) {
        self.close_run();
        self.orders.push(Order::SplitWindow { lines });
    }

    fn erase_window(&mut self, window: i16) {
        self.close_run();
        if window < 0 || window == WINDOW_UPPER as i16 {
            self.status.clear();
        }
        self.orders.push(Order::EraseWindow { window });
    }

    fn erase_line(&mut self) {
        if self.window == WINDOW_UPPER {
            self.status.clear();
        }
    }

    fn set_cursor(&mut self, row: u16, col: u16) {
        if self.window != WINDOW_UPPER {
            return;
        }
        // only the first status row is kept; moving down starts a separate line
        if row > self.cursor.0 && !self.status.is_empty() {
            self.status.push('\n');
        }
        self.cursor = (row, col);
        self.orders.push(Order::SetCursor { row, col });
    }

    fn cursor(&self) -> (u16, u16) {
        self.cursor
    }

    fn set_style(&mut self, style: u16) {
        self.style = if style == 0 { 0 } else { self.style | style };
    }

    fn set_colour(&mut self, foreground: u16, background: u16) {
        self.close_run();
        self.orders.push(Order::SetColour { foreground, background });
    }

    fn flush(&mut self) -> Vec<Order> {
        self.close_run();
        std::mem::take(&mut self.orders)
    }

    fn take_status(&mut self) -> Option<String> {
        if self.status.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.status))
        }
    }
}
