mod cases;

mod environment;
pub use environment::{Environment, NETWORK, device, url_a, url_b, user};

mod merkle;
pub use merkle::MembershipTree;
