/// Proposal reference as typed by a user, `7` or `#7`.
#[derive(Debug, Clone, Copy)]
pub struct ProposalRef(pub u64);

impl std::str::FromStr for ProposalRef {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        let id = digits
            .parse()
            .map_err(|_| format!("Invalid proposal id: {}", s))?;
        Ok(ProposalRef(id))
    }
}

/// Wallet account slot, 1-based like the wallet UI shows them.
#[derive(Debug, Clone, Copy)]
pub struct AccountSlot(pub usize);

impl std::str::FromStr for AccountSlot {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slot: usize = s.parse().map_err(|_| format!("Invalid account slot: {}", s))?;
        if slot == 0 {
            return Err("Account slots start at 1".to_string());
        }
        Ok(AccountSlot(slot - 1))
    }
}
