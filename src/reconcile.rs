use crate::aggregator::AggregatorAccount;
use crate::ledger::LedgerAccount;

/// One aggregator account with its candidate ledger counterparts.
/// Ephemeral, computed per call.
#[derive(Debug, Clone)]
pub struct AccountMatch {
    pub aggregator: AggregatorAccount,
    pub candidates: Vec<LedgerAccount>,
}

/// Pairs each aggregator account with candidate ledger accounts.
///
/// IBAN wins over currency: an aggregator account whose IBAN matches exactly
/// one ledger account gets that single candidate, even if other accounts
/// share its currency. Otherwise accounts sharing the currency are offered,
/// and failing that the full list (the user picks manually). Empty IBANs
/// and currencies never match.
pub fn match_accounts(
    aggregator_accounts: &[AggregatorAccount],
    ledger_accounts: &[LedgerAccount],
) -> Vec<AccountMatch> {
    aggregator_accounts
        .iter()
        .map(|account| {
            log::debug!(
                "Now working on account \"{}\": \"{}\"",
                account.name,
                account.id
            );
            let by_iban = filter_by_iban(ledger_accounts, &account.iban);
            if by_iban.len() == 1 {
                log::debug!(
                    "Account \"{}\" has a single ledger counterpart with the same IBAN, using it.",
                    account.id
                );
                return AccountMatch {
                    aggregator: account.clone(),
                    candidates: by_iban,
                };
            }
            let by_currency = filter_by_currency(ledger_accounts, &account.currency);
            if !by_currency.is_empty() {
                log::debug!(
                    "Account \"{}\" has {} ledger counterparts with the same currency.",
                    account.id,
                    by_currency.len()
                );
                return AccountMatch {
                    aggregator: account.clone(),
                    candidates: by_currency,
                };
            }
            log::debug!("No narrowing for account \"{}\".", account.id);
            AccountMatch {
                aggregator: account.clone(),
                candidates: ledger_accounts.to_vec(),
            }
        })
        .collect()
}

fn filter_by_iban(accounts: &[LedgerAccount], iban: &str) -> Vec<LedgerAccount> {
    if iban.is_empty() {
        return vec![];
    }
    accounts
        .iter()
        .filter(|account| account.iban == iban)
        .cloned()
        .collect()
}

fn filter_by_currency(accounts: &[LedgerAccount], currency: &str) -> Vec<LedgerAccount> {
    if currency.is_empty() {
        return vec![];
    }
    accounts
        .iter()
        .filter(|account| account.currency_code == currency)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator_account(id: &str, iban: &str, currency: &str) -> AggregatorAccount {
        AggregatorAccount {
            id: id.to_string(),
            name: format!("Account {id}"),
            iban: iban.to_string(),
            currency: currency.to_string(),
        }
    }

    fn ledger_account(id: u64, iban: &str, currency: &str) -> LedgerAccount {
        LedgerAccount {
            id,
            name: format!("Ledger {id}"),
            iban: iban.to_string(),
            currency_code: currency.to_string(),
        }
    }

    #[test]
    fn single_iban_match_beats_currency_matches() {
        let aggregator = [aggregator_account("a", "NL00BANK0123456789", "EUR")];
        let ledger = [
            ledger_account(1, "NL00BANK0123456789", "EUR"),
            ledger_account(2, "", "EUR"),
            ledger_account(3, "", "EUR"),
        ];

        let matches = match_accounts(&aggregator, &ledger);
        assert_eq!(1, matches.len());
        assert_eq!(vec![ledger[0].clone()], matches[0].candidates);
    }

    #[test]
    fn multiple_iban_matches_fall_back_to_currency() {
        let shared = "NL00BANK0123456789";
        let aggregator = [aggregator_account("a", shared, "EUR")];
        let ledger = [
            ledger_account(1, shared, "USD"),
            ledger_account(2, shared, "USD"),
            ledger_account(3, "", "EUR"),
        ];

        let matches = match_accounts(&aggregator, &ledger);
        assert_eq!(vec![ledger[2].clone()], matches[0].candidates);
    }

    #[test]
    fn currency_match_narrows_candidates() {
        let aggregator = [aggregator_account("a", "", "EUR")];
        let ledger = [
            ledger_account(1, "", "USD"),
            ledger_account(2, "", "EUR"),
            ledger_account(3, "", "EUR"),
        ];

        let matches = match_accounts(&aggregator, &ledger);
        assert_eq!(
            vec![ledger[1].clone(), ledger[2].clone()],
            matches[0].candidates
        );
    }

    #[test]
    fn no_match_offers_the_full_list() {
        let aggregator = [aggregator_account("a", "NL00BANK0123456789", "GBP")];
        let ledger = [ledger_account(1, "", "USD"), ledger_account(2, "", "EUR")];

        let matches = match_accounts(&aggregator, &ledger);
        assert_eq!(ledger.to_vec(), matches[0].candidates);
    }

    #[test]
    fn empty_iban_and_currency_never_match() {
        let aggregator = [aggregator_account("a", "", "")];
        let ledger = [ledger_account(1, "", ""), ledger_account(2, "", "")];

        // Both sides have empty IBANs and currencies; that must not count as
        // a match, so the full list is offered.
        let matches = match_accounts(&aggregator, &ledger);
        assert_eq!(ledger.to_vec(), matches[0].candidates);
    }
}
