//! Command structs for engine operations.
//!
//! These types group the parameters of a submission and of a loot split,
//! keeping call sites readable and avoiding long argument lists.

use crate::{
    CommunityId, EngineError, MemberId, ResultEngine,
    pricing::{ItemCounts, PriceTable},
    queue::OriginRef,
};

/// Tax withheld from a loot split when none is given.
pub const DEFAULT_TAX_PERCENT: u8 = 19;

/// Submit a regear request for review.
#[derive(Clone, Debug)]
pub struct SubmitCmd {
    pub community: CommunityId,
    pub submitter: MemberId,
    pub origin: OriginRef,
    pub items: ItemCounts,
    pub total_value: i64,
    pub attachments: Vec<String>,
}

impl SubmitCmd {
    #[must_use]
    pub fn new(community: CommunityId, submitter: MemberId, origin: OriginRef) -> Self {
        Self {
            community,
            submitter,
            origin,
            items: ItemCounts::new(),
            total_value: 0,
            attachments: Vec::new(),
        }
    }

    /// Set the requested items with a precomputed total.
    #[must_use]
    pub fn items(mut self, items: ItemCounts, total_value: i64) -> Self {
        self.items = items;
        self.total_value = total_value;
        self
    }

    /// Set the requested items, valued with `prices`.
    #[must_use]
    pub fn appraised(mut self, items: ItemCounts, prices: &PriceTable) -> Self {
        self.total_value = prices.appraise(&items);
        self.items = items;
        self
    }

    #[must_use]
    pub fn attachment(mut self, reference: impl Into<String>) -> Self {
        self.attachments.push(reference.into());
        self
    }

    #[must_use]
    pub fn attachments<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attachments
            .extend(references.into_iter().map(Into::into));
        self
    }

    /// A request is worth reviewing when it names an item or carries media.
    pub fn is_eligible(&self) -> bool {
        !self.items.is_empty() || !self.attachments.is_empty()
    }
}

/// Split loot between members.
#[derive(Clone, Debug)]
pub struct SplitCmd {
    pub community: CommunityId,
    pub gross: i64,
    pub tax_percent: u8,
    pub liquid: i64,
    pub repair: i64,
    pub members: Vec<MemberId>,
}

impl SplitCmd {
    #[must_use]
    pub fn new(community: CommunityId, gross: i64, members: Vec<MemberId>) -> Self {
        Self {
            community,
            gross,
            tax_percent: DEFAULT_TAX_PERCENT,
            liquid: 0,
            repair: 0,
            members,
        }
    }

    #[must_use]
    pub fn tax_percent(mut self, tax_percent: u8) -> Self {
        self.tax_percent = tax_percent;
        self
    }

    /// Extra liquid silver added to the pot.
    #[must_use]
    pub fn liquid(mut self, liquid: i64) -> Self {
        self.liquid = liquid;
        self
    }

    /// Repair cost taken out of the pot.
    #[must_use]
    pub fn repair(mut self, repair: i64) -> Self {
        self.repair = repair;
        self
    }

    /// Work out the shares without touching the ledger.
    pub fn compute(&self) -> ResultEngine<SplitOutcome> {
        if self.gross < 0 || self.liquid < 0 || self.repair < 0 {
            return Err(EngineError::InvalidSplit(
                "amounts must be >= 0".to_string(),
            ));
        }
        if self.tax_percent > 100 {
            return Err(EngineError::InvalidSplit(
                "tax must be between 0 and 100".to_string(),
            ));
        }

        let mut members: Vec<MemberId> = Vec::with_capacity(self.members.len());
        for member in &self.members {
            if !members.contains(member) {
                members.push(*member);
            }
        }
        if members.is_empty() {
            return Err(EngineError::InvalidSplit(
                "at least one member is required".to_string(),
            ));
        }

        let overflow = || EngineError::InvalidSplit("amounts are too large".to_string());
        let tax = self
            .gross
            .checked_mul(i64::from(self.tax_percent))
            .ok_or_else(overflow)?
            / 100;
        let net = (self.gross - tax)
            .checked_sub(self.repair)
            .and_then(|net| net.checked_add(self.liquid))
            .ok_or_else(overflow)?;
        let per_member = net.div_euclid(members.len() as i64);

        Ok(SplitOutcome {
            gross: self.gross,
            tax_percent: self.tax_percent,
            tax,
            repair: self.repair,
            liquid: self.liquid,
            net,
            per_member,
            members,
        })
    }
}

/// The shares of a loot split. `members` holds each member once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitOutcome {
    pub gross: i64,
    pub tax_percent: u8,
    pub tax: i64,
    pub repair: i64,
    pub liquid: i64,
    pub net: i64,
    pub per_member: i64,
    pub members: Vec<MemberId>,
}
