//! The enemy word arsenal.
//!
//! Words are drawn uniformly at random; several semantic clusters repeat on
//! purpose so duplicate words can be on screen at once (the submit tie-break
//! exists for exactly that case).

use rand::Rng;

/// All words an enemy can carry. Uppercase, ASCII, non-empty.
pub const WORDS: &[&str] = &[
    "SYSTEM", "ERROR", "GLITCH", "VIRUS", "DAEMON", "KERNEL", "PROXY", "AGENT", "CIPHER",
    "ACCESS", "DENIED", "REBOOT", "SIGNAL", "TARGET", "LOCKED", "VECTOR", "PLASMA", "SHIELD",
    "ENERGY", "FUSION", "GALAXY", "ORBIT", "ROCKET", "METEOR", "PLANET", "COSMOS", "NEBULA",
    "ATTACK", "DEFEND", "STRIKE", "IMPACT", "BATTLE", "COMBAT", "DANGER", "ESCAPE", "RESCUE",
    "QUANTUM", "DYNAMIC", "KINETIC", "ORGANIC", "VIRTUAL", "DIGITAL", "NETWORK", "CIRCUIT",
    "PROTOCOL", "OVERRIDE", "FIREWALL", "PASSWORD", "DOWNLOAD", "HARDWARE", "SOFTWARE", "FATAL",
];

/// Draw one word uniformly.
pub fn draw(rng: &mut impl Rng) -> &'static str {
    WORDS[rng.gen_range(0..WORDS.len())]
}
