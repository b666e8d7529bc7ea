mod test_account_chain;
pub use test_account_chain::TestAccountChain;
