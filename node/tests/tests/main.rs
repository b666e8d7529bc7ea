mod active_elections;
mod ledger_confirm;
mod votes;
