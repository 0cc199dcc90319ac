use std::fmt::Display;

use bytes::Bytes;

use crate::{
    action::Action,
    options::ServiceType,
    presets::{proxy::Proxy, tracker::Tracker, PRESET_PROXY, PRESET_TRACKER},
};

mod preset;

pub use preset::{Context, DynPreset, Preset};

/// Upward traverses the presets in list order, downward in reverse order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upward,
    Downward,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Upward => Direction::Downward,
            Direction::Downward => Direction::Upward,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upward => f.write_str("upward"),
            Direction::Downward => f.write_str("downward"),
        }
    }
}

/// Handle to a suspended traversal, passed back to `Pipeline::resume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    pub stage: usize,
    pub direction: Direction,
}

/// Buffers leaving the pipeline, grouped by the direction they travel.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Output {
    pub upward: Vec<Bytes>,
    pub downward: Vec<Bytes>,
}

impl Output {
    fn push(&mut self, direction: Direction, bufs: Vec<Bytes>) {
        match direction {
            Direction::Upward => self.upward.extend(bufs),
            Direction::Downward => self.downward.extend(bufs),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upward.is_empty() && self.downward.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Hook {
    BeforeOut,
    ClientOut,
    ServerOut,
    ServerIn,
    ClientIn,
    BeforeIn,
}

impl Hook {
    fn pair(service_type: ServiceType, direction: Direction) -> [Hook; 2] {
        match (service_type, direction) {
            (ServiceType::Client, Direction::Upward) => [Hook::BeforeOut, Hook::ClientOut],
            (ServiceType::Client, Direction::Downward) => [Hook::ClientIn, Hook::BeforeIn],
            (ServiceType::Server, Direction::Upward) => [Hook::BeforeOut, Hook::ServerOut],
            (ServiceType::Server, Direction::Downward) => [Hook::ServerIn, Hook::BeforeIn],
        }
    }

    fn call(self, preset: &mut dyn Preset, buf: Bytes, ctx: &mut Context) {
        match self {
            Hook::BeforeOut => preset.before_out(buf, ctx),
            Hook::ClientOut => preset.client_out(buf, ctx),
            Hook::ServerOut => preset.server_out(buf, ctx),
            Hook::ServerIn => preset.server_in(buf, ctx),
            Hook::ClientIn => preset.client_in(buf, ctx),
            Hook::BeforeIn => preset.before_in(buf, ctx),
        }
    }
}

pub type Notifier = Box<dyn FnMut(Action) + Send>;

/// The ordered presets of one connection.
pub struct Pipeline {
    presets: Vec<DynPreset>,
    upward_hooks: [Hook; 2],
    downward_hooks: [Hook; 2],
    notifier: Option<Notifier>,
    destroyed: bool,
}

impl Pipeline {
    /// The client always starts with `proxy` and both roles always end with `tracker`.
    pub fn new(service_type: ServiceType, mut presets: Vec<DynPreset>) -> Self {
        if service_type.is_client() && presets.first().map(|p| p.name()) != Some(PRESET_PROXY) {
            presets.insert(0, Box::new(Proxy::new()));
        }

        if presets.last().map(|p| p.name()) != Some(PRESET_TRACKER) {
            presets.push(Box::new(Tracker::new()));
        }

        Self {
            presets,
            upward_hooks: Hook::pair(service_type, Direction::Upward),
            downward_hooks: Hook::pair(service_type, Direction::Downward),
            notifier: None,
            destroyed: false,
        }
    }

    pub fn preset_names(&self) -> Vec<&'static str> {
        self.presets.iter().map(|p| p.name()).collect()
    }

    /// Register the receiver of actions no preset handled.
    pub fn on_notified(&mut self, notifier: Notifier) {
        self.notifier = Some(notifier);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Run `buf` through every preset in `direction`.
    pub fn feed(&mut self, direction: Direction, buf: Bytes) -> Output {
        let mut output = Output::default();

        if self.destroyed {
            return output;
        }

        let org_data = buf.clone();
        self.traverse(direction, 0, vec![buf], &org_data, &mut output);
        output
    }

    /// Deliver `action` to the presets in list order, the first one returning true
    /// handles it. Unhandled actions go to the notifier.
    pub fn on_broadcast(&mut self, action: Action) {
        self.dispatch(None, action);
    }

    /// Continue a traversal suspended at `continuation` after its remote is connected.
    pub fn resume(&mut self, continuation: Continuation) -> Output {
        let mut output = Output::default();

        if self.destroyed || continuation.stage >= self.presets.len() {
            return output;
        }

        let Continuation { stage, direction } = continuation;
        let mut ctx = Context::new(stage, direction);

        self.presets[stage].on_connected(&mut ctx);

        if !self.settle(stage, &mut ctx, &Bytes::new(), &mut output) {
            return Output::default();
        }

        let pos = self.position(stage, direction) + 1;
        self.traverse(direction, pos, ctx.outputs, &Bytes::new(), &mut output);
        output
    }

    /// Call `on_destroy` on each preset once, later calls and feeds do nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        self.destroyed = true;

        for preset in self.presets.iter_mut() {
            preset.on_destroy();
        }

        self.presets.clear();
        self.notifier = None;
    }

    fn position(&self, stage: usize, direction: Direction) -> usize {
        match direction {
            Direction::Upward => stage,
            Direction::Downward => self.presets.len() - 1 - stage,
        }
    }

    fn traverse(
        &mut self,
        direction: Direction,
        from: usize,
        mut bufs: Vec<Bytes>,
        org_data: &Bytes,
        output: &mut Output,
    ) {
        let hooks = match direction {
            Direction::Upward => self.upward_hooks,
            Direction::Downward => self.downward_hooks,
        };

        for pos in from..self.presets.len() {
            // the mapping between stage and position is its own inverse
            let stage = self.position(pos, direction);

            for hook in hooks {
                let mut next_bufs = vec![];

                for buf in bufs {
                    let mut ctx = Context::new(stage, direction);

                    hook.call(self.presets[stage].as_mut(), buf, &mut ctx);

                    if !self.settle(stage, &mut ctx, org_data, output) {
                        *output = Output::default();
                        return;
                    }

                    next_bufs.append(&mut ctx.outputs);
                }

                bufs = next_bufs;
            }

            if bufs.is_empty() {
                return;
            }
        }

        output.push(direction, bufs);
    }

    /// Apply the side effects of a hook call, returns false if the preset failed.
    fn settle(&mut self, stage: usize, ctx: &mut Context, org_data: &Bytes, output: &mut Output) -> bool {
        if let Some(message) = ctx.failure.take() {
            let name = self.presets[stage].name();

            log::debug!("[pipeline] preset {} failed: {}", name, message);

            self.escalate(Action::PresetFailed {
                name,
                message,
                org_data: org_data.clone(),
            });
            return false;
        }

        output.push(ctx.direction().opposite(), std::mem::take(&mut ctx.replies));

        for action in std::mem::take(&mut ctx.actions) {
            self.dispatch(Some(stage), action);
        }

        true
    }

    fn dispatch(&mut self, sender: Option<usize>, action: Action) {
        if self.destroyed {
            return;
        }

        let handled = self
            .presets
            .iter_mut()
            .enumerate()
            .filter(|(i, _)| Some(*i) != sender)
            .any(|(_, preset)| preset.on_notified(&action));

        if !handled {
            self.escalate(action);
        }
    }

    fn escalate(&mut self, action: Action) {
        match self.notifier.as_mut() {
            Some(notify) => notify(action),
            None => log::debug!("[pipeline] unhandled action {}", action),
        }
    }
}
