//! Cosmetic catalog, outfits, and equipping them on a skeleton
//!
//! Catalog items name the rig skin they equip and the recolor colors they
//! carry. Applying an outfit swaps skins, flips skin and hair slots over to
//! their shader-variant attachments, and builds the [`CosmeticOverride`] the
//! mesh uses to pick recolor materials.

use std::rc::Rc;

use anyhow::{Context, Result};
use puppet_render::{
    shader_attachment_for, CosmeticOverride, CosmeticsConfig, RecolorColors, TextureResolver,
    HAIR_SLOTS, SKIN_SLOTS,
};
use puppet_rig::{Skeleton, DEFAULT_SKIN};
use serde::{Deserialize, Serialize};

/// Where an item is worn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CosmeticSocket {
    HeadTop,
    Skin,
    Hair,
    /// Scene themes; never touch the rig
    Theme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosmeticItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cost: u32,
    pub socket: CosmeticSocket,
    /// Rig skin equipped with this item
    #[serde(default)]
    pub skin: Option<String>,
    #[serde(default)]
    pub recolor: Option<RecolorColors>,
    #[serde(default)]
    pub theme: Option<String>,
}

/// Everything a player can equip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub items: Vec<CosmeticItem>,
}

impl Catalog {
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).context("Failed to parse cosmetic catalog")
    }

    pub fn find(&self, id: &str) -> Option<&CosmeticItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn in_socket(&self, socket: CosmeticSocket) -> impl Iterator<Item = &CosmeticItem> {
        self.items.iter().filter(move |item| item.socket == socket)
    }
}

/// Hair styles and the slots each one shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HairStyle {
    WindsweptShort,
    WindsweptLong,
}

impl HairStyle {
    /// Hair items are identified by their style id.
    pub fn from_item_id(id: &str) -> Option<Self> {
        match id {
            "windswept_short" => Some(Self::WindsweptShort),
            "windswept_long" => Some(Self::WindsweptLong),
            _ => None,
        }
    }

    pub fn slots(&self) -> &'static [&'static str] {
        match self {
            Self::WindsweptShort => &["HairFront"],
            Self::WindsweptLong => &["HairFront", "HairBack"],
        }
    }
}

/// One equipped item, optionally with colors overriding the catalog's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipped {
    pub item: String,
    #[serde(default)]
    pub recolor: Option<RecolorColors>,
}

impl Equipped {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            recolor: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outfit {
    pub name: String,
    pub hat: Option<Equipped>,
    pub skin: Option<Equipped>,
    pub hair: Option<Equipped>,
}

impl Outfit {
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).context("Failed to parse outfit")
    }
}

/// Applies outfits from a catalog to skeletons.
pub struct Wardrobe {
    catalog: Catalog,
    cosmetics: CosmeticsConfig,
    masks: Option<Rc<dyn TextureResolver>>,
}

impl Wardrobe {
    pub fn new(catalog: Catalog, cosmetics: CosmeticsConfig) -> Self {
        Self {
            catalog,
            cosmetics,
            masks: None,
        }
    }

    /// Resolver for hat mask pages; without one hats fall back to hue recolor.
    pub fn with_masks(mut self, resolver: Rc<dyn TextureResolver>) -> Self {
        self.masks = Some(resolver);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn lookup(&self, equipped: Option<&Equipped>) -> Option<&CosmeticItem> {
        let equipped = equipped?;
        let item = self.catalog.find(&equipped.item);
        if item.is_none() {
            log::warn!("Outfit references unknown item '{}'", equipped.item);
        }
        item
    }

    /// Equip `outfit` on the skeleton and return the recolor override to
    /// install on its mesh, or `None` when nothing recolors.
    ///
    /// With no outfit only the override is dropped; skins stay as they are.
    pub fn apply(&self, outfit: Option<&Outfit>, skeleton: &mut Skeleton) -> Option<CosmeticOverride> {
        let outfit = outfit?;

        let hat = self.lookup(outfit.hat.as_ref());
        let skin = self.lookup(outfit.skin.as_ref());
        // Hair styles need not be catalog items
        let hair = outfit
            .hair
            .as_ref()
            .and_then(|h| self.catalog.find(&h.item));

        let hat_recolor = recolor_for(outfit.hat.as_ref(), hat);
        let skin_recolor = recolor_for(outfit.skin.as_ref(), skin);
        let hair_recolor = recolor_for(outfit.hair.as_ref(), hair);

        if let Some(name) = hat.and_then(|item| item.skin.as_deref()) {
            equip_skin(skeleton, name);
        }
        if let Some(name) = skin.and_then(|item| item.skin.as_deref()) {
            if name != DEFAULT_SKIN {
                equip_skin(skeleton, name);
            }
        }

        if skin_recolor.is_some() {
            switch_skin_slots(skeleton);
        }
        let style = outfit.hair.as_ref().map(|h| h.item.as_str());
        switch_hair_slots(skeleton, hair_recolor.is_some(), style);
        skeleton.update_world_transform();

        let mut cosmetic = CosmeticOverride::new(self.cosmetics.clone());
        if let Some(masks) = &self.masks {
            cosmetic = cosmetic.with_masks(masks.clone());
        }
        cosmetic.hat = hat_recolor;
        cosmetic.skin = skin_recolor;
        cosmetic.hair = hair_recolor;

        if cosmetic.is_empty() {
            None
        } else {
            log::info!(
                "Outfit '{}': recoloring hat={} skin={} hair={}",
                outfit.name,
                cosmetic.hat.is_some(),
                cosmetic.skin.is_some(),
                cosmetic.hair.is_some()
            );
            Some(cosmetic)
        }
    }
}

/// Outfit colors win over the catalog's; empty color sets count as none.
fn recolor_for(equipped: Option<&Equipped>, item: Option<&CosmeticItem>) -> Option<RecolorColors> {
    equipped
        .and_then(|e| e.recolor)
        .or_else(|| item.and_then(|i| i.recolor))
        .filter(|colors| !colors.is_empty())
}

fn equip_skin(skeleton: &mut Skeleton, name: &str) {
    if skeleton.set_skin(name) {
        skeleton.set_to_setup_pose();
        skeleton.update_world_transform();
    }
}

/// Show the shader variant on every skin slot the rig has.
fn switch_skin_slots(skeleton: &mut Skeleton) {
    for (slot_name, shader) in SKIN_SLOTS {
        let Some(index) = skeleton.data().find_slot(slot_name) else {
            continue;
        };
        let attachment = skeleton
            .data()
            .find_attachment_in_any_skin(slot_name, shader)
            .cloned();
        if let Some(attachment) = attachment {
            skeleton.assign_attachment(index, Some(attachment));
        }
    }
}

/// Hide both hair slots, then show the style's slots when the hair recolors.
fn switch_hair_slots(skeleton: &mut Skeleton, recolored: bool, style: Option<&str>) {
    for slot_name in HAIR_SLOTS {
        if let Some(index) = skeleton.data().find_slot(slot_name) {
            skeleton.assign_attachment(index, None);
        }
    }

    let Some(style) = style.filter(|_| recolored) else {
        return;
    };
    let Some(style) = HairStyle::from_item_id(style) else {
        log::warn!("Unknown hair style '{}'", style);
        return;
    };

    for slot_name in style.slots() {
        let Some(index) = skeleton.data().find_slot(slot_name) else {
            continue;
        };
        let Some(shader) = shader_attachment_for(slot_name) else {
            continue;
        };
        let attachment = skeleton
            .data()
            .find_attachment_in_any_skin(slot_name, shader)
            .cloned();
        match attachment {
            Some(attachment) => skeleton.assign_attachment(index, Some(attachment)),
            None => log::warn!("Slot '{}' has no '{}' attachment", slot_name, shader),
        }
    }
}
