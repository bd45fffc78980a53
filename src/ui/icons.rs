//! Shared UI icons.
//!
//! Each icon has a plain-text fallback for terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");

// Phase indicators
pub static IMPLEMENT: Emoji<'_, '_> = Emoji("🔨 ", "[I]");
pub static REVIEW: Emoji<'_, '_> = Emoji("🔍 ", "[R]");
pub static FINALIZE: Emoji<'_, '_> = Emoji("📦 ", "[F]");

// Run indicators
pub static RETRY: Emoji<'_, '_> = Emoji("🔄 ", "[RETRY]");
pub static BLOCKED: Emoji<'_, '_> = Emoji("🚧 ", "[BLOCK]");
pub static COMMIT: Emoji<'_, '_> = Emoji("📝 ", "[GIT]");
pub static ARCHIVE: Emoji<'_, '_> = Emoji("🗄️  ", "[ARCH]");
