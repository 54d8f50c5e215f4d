use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::warn;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Terminal was resized
  Resize,
  /// Periodic tick for query polling and toast expiry
  Tick,
}

/// Merges terminal input with a fixed-rate tick
pub struct EventHandler {
  stream: EventStream,
  ticker: Interval,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let mut ticker = interval(tick_rate);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Self {
      stream: EventStream::new(),
      ticker,
    }
  }

  /// Receive the next event. Returns `None` when the terminal input
  /// stream has closed.
  pub async fn next(&mut self) -> Option<Event> {
    loop {
      tokio::select! {
        maybe = self.stream.next() => {
          match maybe {
            // Windows terminals also report key release; only presses count
            Some(Ok(CrosstermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
              return Some(Event::Key(key));
            }
            Some(Ok(CrosstermEvent::Resize(_, _))) => return Some(Event::Resize),
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
              warn!("terminal event error: {}", e);
              continue;
            }
            None => return None,
          }
        }
        _ = self.ticker.tick() => return Some(Event::Tick),
      }
    }
  }
}
