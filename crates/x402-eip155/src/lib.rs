pub mod chain;
pub mod v1_eip155_exact;
pub mod v2_eip155_exact;

pub use v1_eip155_exact::V1Eip155Exact;
pub use v2_eip155_exact::V2Eip155Exact;

pub use v1_eip155_exact::client::V1Eip155ExactClient;
pub use v2_eip155_exact::client::V2Eip155ExactClient;
