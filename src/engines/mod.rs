//! Host search engine implementations.

mod fofa;
mod netlas;
mod shodan;
mod zoomeye;

pub use fofa::Fofa;
pub use netlas::Netlas;
pub use shodan::Shodan;
pub use zoomeye::Zoomeye;
