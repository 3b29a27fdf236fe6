//! Shared UI icons and emojis.
//!
//! This module provides common emoji constants used across the UI components
//! for consistent visual styling.

use console::Emoji;

use crate::phase::FileAction;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");
pub static SKIPPED: Emoji<'_, '_> = Emoji("⏭️  ", "[skip]");

// File indicators
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+");
pub static FILE_MOD: Emoji<'_, '_> = Emoji("📝 ", "~");
pub static FILE_DEL: Emoji<'_, '_> = Emoji("🗑️  ", "-");

// Lineage indicators
pub static SPLIT: Emoji<'_, '_> = Emoji("✂️  ", "[split]");
pub static MERGE: Emoji<'_, '_> = Emoji("🔗 ", "[merge]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");

pub fn file_action_icon(action: FileAction) -> &'static Emoji<'static, 'static> {
    match action {
        FileAction::Create => &FILE_NEW,
        FileAction::Modify => &FILE_MOD,
        FileAction::Delete => &FILE_DEL,
    }
}
