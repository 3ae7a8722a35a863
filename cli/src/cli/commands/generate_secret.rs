use clstamp_core::proxy::server::generate_secret;

pub fn run() {
    println!("{}", generate_secret());
}
