//! Driver matching: candidate discovery and ranking, the offer responder
//! seam, and the assignment engine with its conditional hand-off.

pub mod candidates;
pub mod engine;
pub mod responder;

pub use candidates::{find_candidates, rank_candidates, DriverCandidate};
pub use engine::{match_ride, MatchOutcome};
pub use responder::{
    AcceptanceRateResponder, FnResponder, OfferDecision, OfferResponder, ScriptedResponder,
};
