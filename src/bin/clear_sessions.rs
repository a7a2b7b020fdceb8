#[cfg(feature = "ssr")]
use gaming_arena::{clear_expired_sessions, establish_connection};

#[cfg(feature = "ssr")]
fn main() {
    let mut conn = establish_connection();
    let removed = clear_expired_sessions(&mut conn).expect("Failed to clear expired sessions");
    println!("Removed {} expired sessions.", removed);
}

#[cfg(not(feature = "ssr"))]
fn main() {
    println!("This binary requires the 'ssr' feature to be enabled.");
}
