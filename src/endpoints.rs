//! Backend endpoint paths, relative to the configured API base URL.

pub const LOGIN: &str = "/login/";
pub const PROFILE: &str = "/teste/";
pub const REGISTER: &str = "/auth/register/";
pub const RESET_PASSWORD: &str = "/senha/recupera/codigo/";
pub const CHANGE_PASSWORD: &str = "/auth/update-password/";
pub const CONFIRM_EMAIL: &str = "/usuario/confirma/";
