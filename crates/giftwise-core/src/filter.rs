use std::collections::BTreeSet;

use rand::Rng;
use tracing::{
  debug,
  trace
};

use crate::gift::Gift;
use crate::persona::Persona;

pub const DEFAULT_RECOMMEND_PROBABILITY:
  f64 = 0.3;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum PriceBucket {
  Under25,
  From25To50,
  From50To100,
  From100To200,
  Over200
}

impl PriceBucket {
  pub const ALL: [PriceBucket; 5] = [
    PriceBucket::Under25,
    PriceBucket::From25To50,
    PriceBucket::From50To100,
    PriceBucket::From100To200,
    PriceBucket::Over200
  ];

  pub fn parse(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "under25" => {
        Some(Self::Under25)
      }
      | "25to50" => {
        Some(Self::From25To50)
      }
      | "50to100" => {
        Some(Self::From50To100)
      }
      | "100to200" => {
        Some(Self::From100To200)
      }
      | "over200" => {
        Some(Self::Over200)
      }
      | _ => None
    }
  }

  pub fn key(self) -> &'static str {
    match self {
      | Self::Under25 => "under25",
      | Self::From25To50 => "25to50",
      | Self::From50To100 => "50to100",
      | Self::From100To200 => {
        "100to200"
      }
      | Self::Over200 => "over200"
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Self::Under25 => "Under $25",
      | Self::From25To50 => "$25-$50",
      | Self::From50To100 => {
        "$50-$100"
      }
      | Self::From100To200 => {
        "$100-$200"
      }
      | Self::Over200 => "Over $200"
    }
  }

  /// Buckets are disjoint: 25 and 50
  /// fall in `25to50`, 100 in
  /// `50to100`, 200 in `100to200`.
  pub fn contains(
    self,
    value: f64
  ) -> bool {
    match self {
      | Self::Under25 => value < 25.0,
      | Self::From25To50 => {
        (25.0..=50.0).contains(&value)
      }
      | Self::From50To100 => {
        value > 50.0 && value <= 100.0
      }
      | Self::From100To200 => {
        value > 100.0 && value <= 200.0
      }
      | Self::Over200 => value > 200.0
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum SortOption {
  #[default]
  Relevance,
  PriceLowToHigh,
  PriceHighToLow,
  Newest
}

impl SortOption {
  pub fn parse(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "relevance" => {
        Some(Self::Relevance)
      }
      | "pricelowtohigh"
      | "price-asc"
      | "price" => {
        Some(Self::PriceLowToHigh)
      }
      | "pricehightolow"
      | "price-desc" => {
        Some(Self::PriceHighToLow)
      }
      | "newest" => Some(Self::Newest),
      | _ => None
    }
  }

  pub fn key(self) -> &'static str {
    match self {
      | Self::Relevance => "relevance",
      | Self::PriceLowToHigh => {
        "priceLowToHigh"
      }
      | Self::PriceHighToLow => {
        "priceHighToLow"
      }
      | Self::Newest => "newest"
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Self::Relevance => "Relevance",
      | Self::PriceLowToHigh => {
        "Price: Low to High"
      }
      | Self::PriceHighToLow => {
        "Price: High to Low"
      }
      | Self::Newest => "Newest"
    }
  }
}

/// User-adjustable filters applied
/// after the persona pre-filter.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
  pub categories:    BTreeSet<String>,
  pub personalities: BTreeSet<String>,
  pub price:         Option<PriceBucket>
}

impl FilterSet {
  pub fn is_empty(&self) -> bool {
    self.categories.is_empty()
      && self.personalities.is_empty()
      && self.price.is_none()
  }

  pub fn matches(
    &self,
    gift: &Gift
  ) -> bool {
    if !self.categories.is_empty()
      && !self
        .categories
        .contains(&gift.category)
    {
      return false;
    }

    if !self.personalities.is_empty()
      && !gift.match_tags.iter().any(
        |tag| {
          self.personalities.contains(tag)
        }
      )
    {
      return false;
    }

    if let Some(bucket) = self.price
      && !bucket
        .contains(gift.price_value)
    {
      return false;
    }

    true
  }
}

/// Stage 1: narrows the catalog to the
/// persona's occasion, any of its
/// personality tags, and its mood.
#[tracing::instrument(skip(
  catalog, persona
))]
pub fn persona_prefilter(
  catalog: &[Gift],
  persona: Option<&Persona>
) -> Vec<Gift> {
  let Some(persona) = persona else {
    return catalog.to_vec();
  };

  let out: Vec<Gift> = catalog
    .iter()
    .filter(|gift| {
      if let Some(occasion) =
        persona.occasion()
        && !gift.suits_occasion(occasion)
      {
        return false;
      }

      if !persona
        .personality_tags
        .is_empty()
        && !gift.has_any_tag(
          &persona.personality_tags
        )
      {
        return false;
      }

      if let Some(mood) = persona.mood()
        && !gift.suits_mood(mood)
      {
        return false;
      }

      true
    })
    .cloned()
    .collect();

  debug!(
    before = catalog.len(),
    after = out.len(),
    "applied persona pre-filter"
  );
  out
}

/// Marks each gift recommended by an
/// independent draw.
pub fn assign_recommended<R>(
  gifts: &mut [Gift],
  probability: f64,
  rng: &mut R
) where
  R: Rng + ?Sized
{
  let p = if probability.is_finite() {
    probability.clamp(0.0, 1.0)
  } else {
    DEFAULT_RECOMMEND_PROBABILITY
  };

  for gift in gifts.iter_mut() {
    gift.recommended = rng.gen_bool(p);
    trace!(
      id = gift.id,
      recommended = gift.recommended,
      "assigned recommendation"
    );
  }
}

/// Stage 2 for the suggestions flow.
pub fn apply_filters(
  gifts: &[Gift],
  filters: &FilterSet
) -> Vec<Gift> {
  gifts
    .iter()
    .filter(|gift| filters.matches(gift))
    .cloned()
    .collect()
}

/// Stage 3. `sort_by` is stable, so
/// ties keep their incoming order.
pub fn sort_gifts(
  gifts: &mut [Gift],
  sort: SortOption
) {
  match sort {
    | SortOption::Relevance => {
      gifts.sort_by_key(|gift| {
        !gift.recommended
      });
    }
    | SortOption::PriceLowToHigh => {
      gifts.sort_by(|a, b| {
        a.price_value
          .total_cmp(&b.price_value)
      });
    }
    | SortOption::PriceHighToLow => {
      gifts.sort_by(|a, b| {
        b.price_value
          .total_cmp(&a.price_value)
      });
    }
    | SortOption::Newest => {
      gifts.sort_by(|a, b| b.id.cmp(&a.id));
    }
  }
}

/// Persona-driven suggestions. Holds the
/// Stage-1 result so filter and sort
/// changes re-run only Stages 2 and 3.
#[derive(Debug, Clone)]
pub struct Suggestions {
  base: Vec<Gift>
}

impl Suggestions {
  pub fn build<R>(
    catalog: &[Gift],
    persona: Option<&Persona>,
    probability: f64,
    rng: &mut R
  ) -> Self
  where
    R: Rng + ?Sized
  {
    let mut base = persona_prefilter(
      catalog, persona
    );
    assign_recommended(
      &mut base,
      probability,
      rng
    );
    Self {
      base
    }
  }

  pub fn base(&self) -> &[Gift] {
    &self.base
  }

  pub fn view(
    &self,
    filters: &FilterSet,
    sort: SortOption
  ) -> Vec<Gift> {
    let sort = if sort
      == SortOption::Newest
    {
      debug!(
        "newest ordering is a browse \
         option; using relevance"
      );
      SortOption::Relevance
    } else {
      sort
    };

    let mut out =
      apply_filters(&self.base, filters);
    sort_gifts(&mut out, sort);
    out
  }
}

/// Free-browse flow: single exclusive
/// category (`None` is "all"), text
/// search, no persona stage.
#[tracing::instrument(skip(catalog))]
pub fn explore(
  catalog: &[Gift],
  category: Option<&str>,
  query: &str,
  sort: SortOption
) -> Vec<Gift> {
  let category = category
    .map(str::trim)
    .filter(|c| {
      !c.is_empty()
        && !c.eq_ignore_ascii_case("all")
    });

  let mut out: Vec<Gift> = catalog
    .iter()
    .filter(|gift| {
      category
        .map(|c| gift.category == c)
        .unwrap_or(true)
    })
    .filter(|gift| {
      gift.matches_query(query)
    })
    .cloned()
    .collect();

  sort_gifts(&mut out, sort);
  debug!(
    count = out.len(),
    "explore results"
  );
  out
}
