//! The RPC/keyboard control surface is external to this crate — the real
//! binding is an RPC service layer or a keyboard-input source, neither of
//! which this subsystem implements. What is in scope is the trivial
//! request/response mapping onto `Player` operations; this module is that
//! mapping, callable from whatever control surface a host process wires up.

use crate::player::Player;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetRateRequest {
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRequest {
    pub time_stamp: i64,
}

/// Dispatches the Player RPC surface table. Request/response payloads are
/// trivial enough that no wire encoding lives here; a real transport
/// binding would deserialize into these requests and serialize whatever
/// this returns.
pub struct ControlSurface<'a> {
    player: &'a Player,
}

impl<'a> ControlSurface<'a> {
    pub fn new(player: &'a Player) -> Self {
        Self { player }
    }

    pub fn pause(&self) {
        self.player.pause();
    }

    pub fn resume(&self) {
        self.player.resume();
    }

    pub fn toggle_paused(&self) {
        self.player.toggle_paused();
    }

    pub fn is_paused(&self) -> bool {
        self.player.is_paused()
    }

    pub fn get_rate(&self) -> f64 {
        self.player.get_rate()
    }

    pub fn set_rate(&self, request: SetRateRequest) -> bool {
        self.player.set_rate(request.rate)
    }

    pub fn play_next(&self) -> bool {
        self.player.play_next()
    }

    /// Always returns success — a bad `time_stamp` only clamps, it never
    /// fails the call.
    pub fn seek(&self, request: SeekRequest) -> bool {
        self.player.seek(request.time_stamp).is_ok()
    }
}
