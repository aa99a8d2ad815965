pub mod trading_results;
