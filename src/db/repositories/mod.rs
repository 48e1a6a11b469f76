mod app_state;
mod companies;
mod daily_entries;
mod stops;
