// src/lib.rs
pub mod ports {
    pub mod channel_feed;
    pub mod replay_feed;
}
pub mod trade {
    pub mod execution {
        pub mod gateway_box;
        pub mod order_gateway;
        pub mod paper_gateway;
    }
}
pub mod autotrader;
pub mod commands;
pub mod config;
pub mod hedge;
pub mod ledger;
pub mod midprice;
pub mod runner;
pub mod signal;
pub mod sizing;
pub mod types;
