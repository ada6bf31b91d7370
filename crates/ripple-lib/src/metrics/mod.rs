pub mod rank_order;

pub use rank_order::{rank_order, RankBy, RankOrderOptions, RankOrderResult, UnitSpikes};
