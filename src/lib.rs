pub mod app;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;

pub mod crypto {
    pub mod token;
}

pub mod models {
    pub mod image;
    pub mod session;
}

pub mod repositories {
    pub mod booked_dates;
    pub mod sessions;
}

pub mod services {
    pub mod mail;
    pub mod staging;
    pub mod thumbnails;
}

pub mod handlers {
    pub mod auth;
    pub mod booked_dates;
    pub mod booking;
    pub mod health;
    pub mod images;
    pub mod pages;
    pub mod passcode;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod passcode;
}

pub mod validation {
    pub mod auth;
    pub mod booking;
    pub mod json;
    pub mod names;
}
