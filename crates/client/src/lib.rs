//! Client code for sitecache.
//!
//! This crate provides the network layer and the offline cache controller
//! shared by the server and CLI.

pub mod controller;
pub mod fetch;

pub use controller::{
    Action, CacheController, ControlMessage, ControllerEvent, ControllerSettings, ControllerStatus, FetchOutcome,
    LifecycleState, ResponseSource, RoutePolicy, decide,
};

pub use fetch::{Destination, FetchConfig, HttpNetwork, Method, Network, NetworkError, Request, parse_request_url};
