//! Terminal presentation of the transcript.

use std::io::Write;

use ragchat_core::{LifecycleState, Message};
use tokio::sync::watch;

pub fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

/// Print assistant replies as they are appended, with a typing indicator
/// while a turn is outstanding. Returns once the transcript channel closes.
pub async fn render_transcript(
    mut messages: watch::Receiver<Vec<Message>>,
    mut state: watch::Receiver<LifecycleState>,
) {
    let mut shown = messages.borrow_and_update().len();
    let mut state_open = true;
    let mut indicator = Indicator::default();

    loop {
        tokio::select! {
            changed = messages.changed() => {
                if changed.is_err() {
                    break;
                }
                let replies: Vec<Message> = messages
                    .borrow_and_update()
                    .iter()
                    .skip(shown)
                    .cloned()
                    .collect();
                shown += replies.len();

                for reply in replies.iter().filter(|m| !m.is_user()) {
                    print_reply(reply);
                    indicator.on_reply();
                }
            }
            changed = state.changed(), if state_open => {
                if changed.is_err() {
                    state_open = false;
                    continue;
                }
                let current = *state.borrow_and_update();
                match indicator.on_state(current) {
                    Some(IndicatorAction::Show) => {
                        print!("…");
                        let _ = std::io::stdout().flush();
                    }
                    Some(IndicatorAction::Clear) => {
                        clear_line();
                        let _ = prompt();
                    }
                    None => {}
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndicatorAction {
    Show,
    Clear,
}

/// Tracks whether the typing indicator is on screen.
///
/// The `Sending` notification can be observed after the reply was already
/// printed, so an indicator left on screen is cleared once `Idle` arrives.
#[derive(Debug, Default)]
struct Indicator {
    visible: bool,
}

impl Indicator {
    fn on_state(&mut self, state: LifecycleState) -> Option<IndicatorAction> {
        match state {
            LifecycleState::Sending if !self.visible => {
                self.visible = true;
                Some(IndicatorAction::Show)
            }
            LifecycleState::Idle if self.visible => {
                self.visible = false;
                Some(IndicatorAction::Clear)
            }
            _ => None,
        }
    }

    /// Printing a reply clears the line the indicator was on.
    const fn on_reply(&mut self) {
        self.visible = false;
    }
}

fn clear_line() {
    print!("\r\x1b[2K");
}

fn print_reply(reply: &Message) {
    // The indicator sits on its own line; clear it before the answer.
    clear_line();
    println!("{}\n", reply.content());
    let _ = prompt();
}
