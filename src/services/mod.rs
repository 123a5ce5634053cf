pub mod ban_registry;
pub mod beatmap;
pub mod calculator;
pub mod ledger;
pub mod mod_policy;
pub mod pp_gate;
pub mod recalculate;
pub mod score_store;
pub mod score_submission;
pub mod statistics;
