#[cfg(feature = "ssr")]
use gaming_arena::{credit_wallet, establish_connection, find_user_by_email};

#[cfg(feature = "ssr")]
fn main() {
    let mut args = std::env::args().skip(1);
    let email = args.next().expect("Usage: credit_wallet <email> <amount>");
    let amount: f64 = args
        .next()
        .expect("Usage: credit_wallet <email> <amount>")
        .parse()
        .expect("Amount must be a number");

    let mut conn = establish_connection();
    let user = find_user_by_email(&mut conn, &email).expect("No account with that email");
    let user = credit_wallet(&mut conn, &user.id, amount).expect("Failed to credit wallet");
    println!("{} now has a balance of {:.2}.", user.email, user.wallet_balance);
}

#[cfg(not(feature = "ssr"))]
fn main() {
    println!("This binary requires the 'ssr' feature to be enabled.");
}
