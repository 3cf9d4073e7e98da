//! Terminal input and the app tick.
//!
//! Key presses come off a blocking crossterm reader; the tick that drives
//! query polling and cache sweeping comes from a tokio interval, so ticks
//! stay regular under heavy typing. Both feed one channel and the app loop
//! awaits a single `next()`.

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for query polling and cache sweeping
  Tick,
}

/// Merges terminal input and the tick timer into one event stream.
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    let keys = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      // Poll with a short timeout so a closed channel ends the reader.
      match event::poll(Duration::from_millis(100)) {
        Ok(true) => {
          if let Ok(CrosstermEvent::Key(key)) = event::read() {
            // Some terminals also deliver key release events.
            if key.kind == KeyEventKind::Press && keys.send(Event::Key(key)).is_err() {
              break;
            }
          }
        }
        Ok(false) => {
          if keys.is_closed() {
            break;
          }
        }
        Err(_) => break,
      }
    });

    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
      loop {
        interval.tick().await;
        if tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event.
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
