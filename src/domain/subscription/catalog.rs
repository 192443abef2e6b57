//! Static plan catalog: entitlements, usage limits, and prices per tier.
//!
//! The catalog is fixed at compile time. Changing a plan means shipping a
//! new build; there is no runtime plan editing.

use once_cell::sync::Lazy;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::domain::foundation::Money;

use super::{BillingCycle, PlanTier};

/// Gated platform features.
///
/// Metered features carry a per-period quota in the catalog; the rest are
/// plain capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Replying to customer reviews. Metered.
    ReviewResponses,

    /// Sending review invitation emails. Metered.
    ReviewInvitations,

    /// REST API calls. Metered.
    ApiCalls,

    /// Ratings and traffic analytics dashboard.
    Analytics,

    /// Embeddable review widgets.
    Widgets,

    /// White-label branding on the company's review page.
    CustomBranding,

    /// Competitor benchmark reports.
    CompetitorReports,
}

impl Feature {
    /// Stable string key used in facts and logs.
    pub fn key(&self) -> &'static str {
        match self {
            Feature::ReviewResponses => "review_responses",
            Feature::ReviewInvitations => "review_invitations",
            Feature::ApiCalls => "api_calls",
            Feature::Analytics => "analytics",
            Feature::Widgets => "widgets",
            Feature::CustomBranding => "custom_branding",
            Feature::CompetitorReports => "competitor_reports",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Everything the catalog knows about one tier.
#[derive(Debug, Clone)]
pub struct PlanDefinition {
    pub tier: PlanTier,

    /// Recurring price when billed monthly.
    pub monthly_price: Money,

    /// Recurring price when billed annually.
    pub annual_price: Money,

    /// All features the tier grants, metered or not.
    pub entitlements: BTreeSet<Feature>,

    /// Per-period quotas for metered features. `None` means unlimited.
    pub usage_limits: BTreeMap<Feature, Option<u64>>,
}

impl PlanDefinition {
    /// Recurring price for the given billing cycle.
    pub fn price(&self, cycle: BillingCycle) -> Money {
        match cycle {
            BillingCycle::Monthly => self.monthly_price,
            BillingCycle::Annual => self.annual_price,
        }
    }
}

fn definition(
    tier: PlanTier,
    monthly_price: Money,
    annual_price: Money,
    flags: &[Feature],
    limits: &[(Feature, Option<u64>)],
) -> PlanDefinition {
    let usage_limits: BTreeMap<Feature, Option<u64>> = limits.iter().copied().collect();
    let mut entitlements: BTreeSet<Feature> = flags.iter().copied().collect();
    // Metered features are entitlements too
    entitlements.extend(usage_limits.keys().copied());
    PlanDefinition {
        tier,
        monthly_price,
        annual_price,
        entitlements,
        usage_limits,
    }
}

static FREE: Lazy<PlanDefinition> = Lazy::new(|| {
    definition(
        PlanTier::Free,
        Money::usd(dec!(0)),
        Money::usd(dec!(0)),
        &[],
        &[(Feature::ReviewResponses, Some(10))],
    )
});

static BASIC: Lazy<PlanDefinition> = Lazy::new(|| {
    definition(
        PlanTier::Basic,
        Money::usd(dec!(10)),
        Money::usd(dec!(100)),
        &[Feature::Analytics, Feature::Widgets],
        &[
            (Feature::ReviewResponses, Some(100)),
            (Feature::ReviewInvitations, Some(100)),
        ],
    )
});

static PREMIUM: Lazy<PlanDefinition> = Lazy::new(|| {
    definition(
        PlanTier::Premium,
        Money::usd(dec!(30)),
        Money::usd(dec!(300)),
        &[
            Feature::Analytics,
            Feature::Widgets,
            Feature::CustomBranding,
        ],
        &[
            (Feature::ReviewResponses, Some(1000)),
            (Feature::ReviewInvitations, Some(500)),
            (Feature::ApiCalls, Some(10_000)),
        ],
    )
});

static ENTERPRISE: Lazy<PlanDefinition> = Lazy::new(|| {
    definition(
        PlanTier::Enterprise,
        Money::usd(dec!(100)),
        Money::usd(dec!(1000)),
        &[
            Feature::Analytics,
            Feature::Widgets,
            Feature::CustomBranding,
            Feature::CompetitorReports,
        ],
        &[
            (Feature::ReviewResponses, None),
            (Feature::ReviewInvitations, Some(5000)),
            (Feature::ApiCalls, Some(100_000)),
        ],
    )
});

/// Static mapping from tier to feature set, price, and default quotas.
///
/// | Tier       | Monthly | Annual | Responses | Invitations | API calls |
/// |------------|---------|--------|-----------|-------------|-----------|
/// | Free       | $0      | $0     | 10        | n/a         | n/a       |
/// | Basic      | $10     | $100   | 100       | 100         | n/a       |
/// | Premium    | $30     | $300   | 1,000     | 500         | 10,000    |
/// | Enterprise | $100    | $1,000 | unlimited | 5,000       | 100,000   |
///
/// Basic and above add analytics and widgets; Premium adds custom
/// branding; Enterprise adds competitor reports.
pub struct EntitlementCatalog;

impl EntitlementCatalog {
    /// Returns the full plan definition for a tier.
    pub fn plan(tier: PlanTier) -> &'static PlanDefinition {
        match tier {
            PlanTier::Free => &FREE,
            PlanTier::Basic => &BASIC,
            PlanTier::Premium => &PREMIUM,
            PlanTier::Enterprise => &ENTERPRISE,
        }
    }

    /// Recurring price for a tier and billing cycle.
    pub fn price(tier: PlanTier, cycle: BillingCycle) -> Money {
        Self::plan(tier).price(cycle)
    }

    /// Feature set granted by a tier.
    pub fn entitlements(tier: PlanTier) -> &'static BTreeSet<Feature> {
        &Self::plan(tier).entitlements
    }

    /// Default per-period quotas for a tier's metered features.
    pub fn usage_limits(tier: PlanTier) -> &'static BTreeMap<Feature, Option<u64>> {
        &Self::plan(tier).usage_limits
    }
}
