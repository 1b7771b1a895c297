pub mod profiles;
pub mod recruitment;
