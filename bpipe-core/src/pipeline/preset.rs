use bytes::Bytes;

use crate::{
    action::Action,
    pipeline::{Continuation, Direction},
};

pub type DynPreset = Box<dyn Preset>;

/// A named transform stage of a pipeline.
///
/// Each connection owns its own presets. Transform hooks receive one buffer at a
/// time and pass results on through the `Context`; the defaults forward the buffer
/// untouched. Which pair of hooks runs depends on the role and the direction:
///
/// | role   | upward                      | downward                  |
/// |--------|-----------------------------|---------------------------|
/// | client | `before_out` → `client_out` | `client_in` → `before_in` |
/// | server | `before_out` → `server_out` | `server_in` → `before_in` |
pub trait Preset: Send {
    fn name(&self) -> &'static str;

    /// Called for actions broadcast by other presets or the session, return true to
    /// stop the delivery.
    fn on_notified(&mut self, _action: &Action) -> bool {
        false
    }

    /// Called by `Pipeline::resume` once a requested remote is connected.
    fn on_connected(&mut self, _ctx: &mut Context) {}

    fn on_destroy(&mut self) {}

    fn before_out(&mut self, buf: Bytes, ctx: &mut Context) {
        ctx.next(buf);
    }

    fn client_out(&mut self, buf: Bytes, ctx: &mut Context) {
        ctx.next(buf);
    }

    fn server_out(&mut self, buf: Bytes, ctx: &mut Context) {
        ctx.next(buf);
    }

    fn server_in(&mut self, buf: Bytes, ctx: &mut Context) {
        ctx.next(buf);
    }

    fn client_in(&mut self, buf: Bytes, ctx: &mut Context) {
        ctx.next(buf);
    }

    fn before_in(&mut self, buf: Bytes, ctx: &mut Context) {
        ctx.next(buf);
    }
}

/// Capabilities handed to a preset hook.
#[derive(Debug)]
pub struct Context {
    stage: usize,
    direction: Direction,
    pub(crate) outputs: Vec<Bytes>,
    pub(crate) replies: Vec<Bytes>,
    pub(crate) actions: Vec<Action>,
    pub(crate) failure: Option<String>,
}

impl Context {
    pub fn new(stage: usize, direction: Direction) -> Self {
        Self {
            stage,
            direction,
            outputs: vec![],
            replies: vec![],
            actions: vec![],
            failure: None,
        }
    }

    /// Pass `buf` on to the next stage, may be called any number of times.
    pub fn next(&mut self, buf: Bytes) {
        if self.failure.is_none() {
            self.outputs.push(buf);
        }
    }

    /// Send `buf` back out of the pipeline to the side the current buffer came from.
    pub fn reply(&mut self, buf: Bytes) {
        if self.failure.is_none() {
            self.replies.push(buf);
        }
    }

    /// Deliver `action` to the other presets once this hook returns.
    pub fn broadcast(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Abort the current buffer, the session decides what happens to the connection.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
        self.outputs.clear();
        self.replies.clear();
    }

    pub fn continuation(&self) -> Continuation {
        Continuation {
            stage: self.stage,
            direction: self.direction,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Take the buffers passed to `next`, used by tests driving a preset directly.
    pub fn take_outputs(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.outputs)
    }

    pub fn take_replies(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.replies)
    }

    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }
}
