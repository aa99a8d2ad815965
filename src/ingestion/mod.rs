pub mod crawler;
pub mod excel_parser;
pub mod html_parser;
pub mod http_client;
