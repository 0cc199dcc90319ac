pub mod action;
pub mod behaviour;
pub mod config;
pub mod net;
pub mod options;
pub mod pipeline;
pub mod presets;
pub mod proxy;
pub mod utils;

pub use action::Action;
pub use behaviour::Behaviour;
pub use net::{
    address::{Address, Host},
    balancer::{Balancer, Upstream},
    connect,
    dns::{DnsCache, Resolver},
    resolve,
    service::{start_tcp_service, ServiceContext, StartupInfo},
    session::Session,
};
pub use options::{
    cli::{Cli, Command},
    client::{ClientOptions, ServerEntry},
    common::{Options, OptionsChecker, PresetList, ServiceType},
    server::ServerOptions,
    utils::{from_json_str, from_yaml_str, options_from_file},
};
pub use pipeline::{Context, Continuation, Direction, DynPreset, Output, Pipeline, Preset};
pub use presets::{create_preset, create_presets, PresetConfig};
