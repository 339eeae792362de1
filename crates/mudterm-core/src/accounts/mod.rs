//! Player accounts and the character roster.
//!
//! - `store`: row access for the relational store
//! - `auth`: sign-up, sign-in and the saved session
//! - `characters`: character lifecycle across the store and the game server

pub mod auth;
pub mod characters;
pub mod store;

pub use auth::{AuthClient, AuthSession, AuthUser, SignUp};
pub use characters::{
    CharacterRecord, CharacterService, MAX_ROLLS, NewCharacter, choose_roll, roll_choices,
};
pub use store::StoreClient;
