//! Tier menus and the order quantity accumulator.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{OrderId, Tier};

const SAVER_ITEMS: &[&str] = &[
    "หมูสามชั้น",
    "สันคอหมู",
    "ตับหมู",
    "ผักกาดขาว",
    "ผักบุ้ง",
    "วุ้นเส้น",
    "ไข่ไก่",
    "น้ำจิ้มสุกี้",
];

// Saver items followed by the premium exclusives.
const PREMIUM_ITEMS: &[&str] = &[
    "หมูสามชั้น",
    "สันคอหมู",
    "ตับหมู",
    "ผักกาดขาว",
    "ผักบุ้ง",
    "วุ้นเส้น",
    "ไข่ไก่",
    "น้ำจิ้มสุกี้",
    "กุ้งแม่น้ำ",
    "เนื้อริบอาย",
    "หอยเชลล์",
    "ชีส",
];

/// Items a tier may order from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Menu {
    items: &'static [&'static str],
}

impl Menu {
    pub const SAVER: Menu = Menu { items: SAVER_ITEMS };
    pub const PREMIUM: Menu = Menu {
        items: PREMIUM_ITEMS,
    };

    /// Menu for a tier; `None` for tiers that cannot order yet.
    #[must_use]
    pub fn for_tier(tier: &Tier) -> Option<Menu> {
        match tier {
            Tier::Saver => Some(Self::SAVER),
            Tier::Premium => Some(Self::PREMIUM),
            Tier::Pending | Tier::Other(_) => None,
        }
    }

    #[must_use]
    pub fn items(&self) -> &'static [&'static str] {
        self.items
    }

    #[must_use]
    pub fn contains(&self, item: &str) -> bool {
        self.items.iter().any(|i| *i == item)
    }
}

/// Quantities picked so far, in the order items were first added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDraft {
    menu: Option<Menu>,
    lines: Vec<(String, u32)>,
}

impl OrderDraft {
    /// A draft that accepts any item name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A draft restricted to the items on `menu`.
    #[must_use]
    pub fn for_menu(menu: Menu) -> Self {
        Self {
            menu: Some(menu),
            lines: Vec::new(),
        }
    }

    /// Add `delta` (may be negative) to an item's quantity and return the new
    /// quantity. Dropping to zero or below removes the item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownItem`] if the draft is bound to a menu that
    /// does not list `item`.
    pub fn adjust(&mut self, item: &str, delta: i32) -> Result<u32, Error> {
        if self.menu.is_some_and(|menu| !menu.contains(item)) {
            return Err(Error::UnknownItem(item.to_owned()));
        }

        let pos = self.lines.iter().position(|(name, _)| name == item);
        let current = pos.map_or(0, |i| self.lines[i].1);
        let next = i64::from(current) + i64::from(delta);

        if next <= 0 {
            if let Some(i) = pos {
                self.lines.remove(i);
            }
            return Ok(0);
        }

        let next = u32::try_from(next).unwrap_or(u32::MAX);
        match pos {
            Some(i) => self.lines[i].1 = next,
            None => self.lines.push((item.to_owned(), next)),
        }
        Ok(next)
    }

    #[must_use]
    pub fn quantity(&self, item: &str) -> u32 {
        self.lines
            .iter()
            .find(|(name, _)| name == item)
            .map_or(0, |(_, qty)| *qty)
    }

    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lines.iter().map(|(_, qty)| qty).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Wire form: one `"item-quantity"` string per picked item.
    #[must_use]
    pub fn item_names(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|(name, qty)| format!("{name}-{qty}"))
            .collect()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// A placed order as confirmed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub items: Vec<String>,
}

impl Order {
    /// Parsed items for display.
    #[must_use]
    pub fn lines(&self) -> Vec<OrderLine> {
        self.items.iter().map(|s| OrderLine::parse(s)).collect()
    }
}

/// One `"name-quantity"` entry of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub name: String,
    pub quantity: u32,
}

impl OrderLine {
    /// Split on the last `-`. A missing or non-numeric quantity means 1.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.rsplit_once('-') {
            Some((name, qty)) if !name.is_empty() => match qty.trim().parse() {
                Ok(quantity) => Self {
                    name: name.to_owned(),
                    quantity,
                },
                Err(_) => Self {
                    name: s.to_owned(),
                    quantity: 1,
                },
            },
            _ => Self {
                name: s.to_owned(),
                quantity: 1,
            },
        }
    }
}
