//! Capability contracts a game backend adapter implements.
//!
//! The registry and the dispatcher only ever see these traits, never the
//! native engine types behind them.

use anyhow::Result;
use gatehouse_model::PlayerId;

/// Minimum a native session handle has to provide.
pub trait PlayerHandle {
    fn id(&self) -> PlayerId;
    fn display_name(&self) -> String;
}

/// Actions on a connected player.
pub trait PlayerActions: PlayerHandle {
    fn message(&self, text: &str);
    fn kick(&self, reason: &str) -> Result<()>;
    fn ban(&self, reason: &str) -> Result<()>;
    fn teleport(&self, x: f32, y: f32, z: f32) -> Result<()>;
}

/// Server-wide actions.
pub trait ServerActions {
    fn broadcast(&self, text: &str);
    fn run_command(&self, command: &str, args: &[String]) -> Result<()>;
}

/// Whoever issued a command: a player typing in chat or the server console.
pub trait Caller {
    fn id(&self) -> PlayerId;
    fn name(&self) -> String;
    fn is_console(&self) -> bool {
        false
    }
    /// Sends text back through whatever channel the command came in on.
    fn reply(&self, text: &str);
}
