use serde::{Deserialize, Serialize};

/// A registered platform user. `id` is assigned by the store on insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "phoneNumber")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegisterForm {
    pub name: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "phoneNumber")]
    pub phone_number: Option<String>,
}

impl From<RegisterForm> for User {
    fn from(form: RegisterForm) -> Self {
        User {
            id: 0,
            name: form.name,
            password: form.password,
            email: form.email,
            phone_number: form.phone_number,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoginForm {
    pub name: Option<String>,
    pub password: Option<String>,
}
