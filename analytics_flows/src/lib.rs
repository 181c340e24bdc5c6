//! First-buyer discovery, top-trader ranking, mint-participant scanning,
//! and the file-report writers that sit downstream of them.

pub mod first_buyers;
pub mod mint_participants;
pub mod reports;

pub use first_buyers::{first_buyers, top_traders, FirstBuyer, FirstBuyersParams, FlowError, RankBy, TopTrader};
pub use mint_participants::{mint_participants, CreationScanMode, MintParticipant, MintParticipantsParams};
pub use reports::{
    append_mint_participants_manifest, first_buyers_csv, first_buyers_json, first_buyers_markdown, ManifestFormat,
    ReportError,
};
