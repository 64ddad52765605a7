//! Rust+ companion protocol messages.
//!
//! Hand-maintained subset of the companion `.proto` (proto2). Only the fields
//! the relay reads or writes are declared; prost skips unknown fields on decode.

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppEmpty {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppRequest {
    #[prost(uint32, required, tag = "1")]
    pub seq: u32,
    #[prost(uint64, required, tag = "2")]
    pub player_id: u64,
    #[prost(int32, required, tag = "3")]
    pub player_token: i32,
    #[prost(uint32, optional, tag = "4")]
    pub entity_id: Option<u32>,
    #[prost(message, optional, tag = "8")]
    pub get_info: Option<AppEmpty>,
    #[prost(message, optional, tag = "14")]
    pub get_entity_info: Option<AppEmpty>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppMessage {
    #[prost(message, optional, tag = "1")]
    pub response: Option<AppResponse>,
    #[prost(message, optional, tag = "2")]
    pub broadcast: Option<AppBroadcast>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppResponse {
    #[prost(uint32, required, tag = "1")]
    pub seq: u32,
    #[prost(message, optional, tag = "4")]
    pub success: Option<AppEmpty>,
    #[prost(message, optional, tag = "5")]
    pub error: Option<AppError>,
    #[prost(message, optional, tag = "6")]
    pub info: Option<AppInfo>,
    #[prost(message, optional, tag = "11")]
    pub entity_info: Option<AppEntityInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppError {
    #[prost(string, required, tag = "1")]
    pub error: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppInfo {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(string, required, tag = "2")]
    pub header_image: String,
    #[prost(string, required, tag = "3")]
    pub url: String,
    #[prost(string, required, tag = "4")]
    pub map: String,
    #[prost(uint32, required, tag = "5")]
    pub map_size: u32,
    #[prost(uint32, required, tag = "6")]
    pub wipe_time: u32,
    #[prost(uint32, required, tag = "7")]
    pub players: u32,
    #[prost(uint32, required, tag = "8")]
    pub max_players: u32,
    #[prost(uint32, required, tag = "9")]
    pub queued_players: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppEntityInfo {
    #[prost(int32, required, tag = "1")]
    pub kind: i32,
    #[prost(message, required, tag = "3")]
    pub payload: AppEntityPayload,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppEntityPayload {
    #[prost(bool, optional, tag = "1")]
    pub value: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppBroadcast {
    #[prost(message, optional, tag = "6")]
    pub entity_changed: Option<AppEntityChanged>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppEntityChanged {
    #[prost(uint32, required, tag = "1")]
    pub entity_id: u32,
    #[prost(message, required, tag = "2")]
    pub payload: AppEntityPayload,
}
