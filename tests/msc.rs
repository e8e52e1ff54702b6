use aion_precompiled::common::{Addr, Scalar};
use aion_precompiled::core::msc::construct_msg;
use aion_precompiled::core::params::{COST, MAX_OWNERS, MIN_OWNERS, TX_NRG_MAX};
use aion_precompiled::core::{
    MultiSigContract, PrecompiledContract, PrecompiledResult, ResultCode,
};
use aion_precompiled::crypto::{hash32, FRAME_LEN};
use aion_precompiled::state::{DataWord, WordStoreR, WordStoreW};

use aion_precompiled_tools::keys::{
    construct_create_wallet_input, construct_send_tx_input, produce_keys,
    TestKey,
};
use aion_precompiled_tools::repo::MemRepo;

const DEFAULT_BALANCE: u64 = 100_000;
const AMOUNT: u64 = 10;
const NRG_LIMIT: u64 = 100_000;
const NRG_PRICE: u64 = 10_000_000_000;

fn execute(
    repo: &mut MemRepo, caller: &Addr, input: &[u8], nrg_limit: u64,
) -> PrecompiledResult {
    MultiSigContract::new(repo, *caller).execute(input, nrg_limit)
}

fn expect(
    repo: &mut MemRepo, caller: &Addr, input: &[u8], nrg_limit: u64,
    code: ResultCode, nrg_left: u64,
) -> PrecompiledResult {
    let res = execute(repo, caller, input, nrg_limit);
    assert_eq!(res.code, code);
    assert_eq!(res.nrg_left, nrg_left);
    res
}

fn addresses(keys: &[TestKey]) -> Vec<Addr> {
    keys.iter().map(|k| k.address()).collect()
}

/// Creates a wallet owned by `keys` (first key is the caller), funds it,
/// and returns its address.
fn create_wallet(
    repo: &mut MemRepo, keys: &[TestKey], threshold: u64, balance: u64,
) -> Addr {
    let owners = addresses(keys);
    let input = construct_create_wallet_input(threshold, &owners);
    let res = expect(
        repo,
        &owners[0],
        &input,
        NRG_LIMIT,
        ResultCode::Success,
        NRG_LIMIT - COST,
    );
    let wallet = Addr::from_slice(&res.return_data);
    repo.set_balance(&wallet, Scalar::from(balance));
    wallet
}

fn sign_all(keys: &[TestKey], count: usize, msg: &[u8]) -> Vec<[u8; FRAME_LEN]> {
    keys.iter().take(count).map(|k| k.sign_frame(msg)).collect()
}

/// The signed message with arbitrary pre-encoded nonce and amount fields,
/// for signing over values the canonical builder cannot express (negative
/// nonces or amounts).
fn custom_msg(
    nonce_bytes: &[u8], to: &Addr, amount_bytes: &[u8], nrg_limit: u64,
    nrg_price: u64,
) -> Vec<u8> {
    let mut msg = Vec::new();
    msg.extend_from_slice(nonce_bytes);
    msg.extend_from_slice(to.as_bytes());
    msg.extend_from_slice(amount_bytes);
    msg.extend_from_slice(&nrg_limit.to_be_bytes());
    msg.extend_from_slice(&nrg_price.to_be_bytes());
    msg
}

fn meta_key() -> DataWord {
    let mut key = [0u8; 16];
    key[0] = 0x80;
    DataWord::Single(key)
}

fn owner_half_key(i: u64, high: bool) -> DataWord {
    let mut key = [0u8; 16];
    key[8..].copy_from_slice(&i.to_be_bytes());
    if high {
        key[0] = 0x40;
    }
    DataWord::Single(key)
}

fn wallet_meta(repo: &MemRepo, wallet: &Addr) -> (u64, u64) {
    let meta = repo
        .get_storage_value(wallet, &meta_key())
        .expect("wallet has no meta row");
    let bytes = meta.bytes();
    let mut threshold = [0u8; 8];
    let mut count = [0u8; 8];
    threshold.copy_from_slice(&bytes[..8]);
    count.copy_from_slice(&bytes[8..]);
    (u64::from_be_bytes(threshold), u64::from_be_bytes(count))
}

fn wallet_owner(repo: &MemRepo, wallet: &Addr, i: u64) -> Addr {
    let mut account = [0u8; 32];
    for (high, offset) in [(false, 0), (true, 16)] {
        let half = repo
            .get_storage_value(wallet, &owner_half_key(i, high))
            .expect("wallet has no owner row");
        account[offset..offset + 16].copy_from_slice(half.bytes());
    }
    Addr::from(account)
}

// <------------------------------ energy & framing ------------------------------>

#[test]
fn test_nrg_below_cost() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(3);
    let input = construct_create_wallet_input(2, &addresses(&keys));
    let caller = keys[0].address();

    expect(&mut repo, &caller, &input, 0, ResultCode::OutOfNrg, 0);
    expect(&mut repo, &caller, &input, COST - 1, ResultCode::OutOfNrg, 0);
    assert!(repo.is_empty());
}

#[test]
fn test_nrg_above_max() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(3);
    let input = construct_create_wallet_input(2, &addresses(&keys));
    let caller = keys[0].address();

    // the caller keeps the energy on an illegal limit
    expect(
        &mut repo,
        &caller,
        &input,
        TX_NRG_MAX + 1,
        ResultCode::InvalidNrgLimit,
        TX_NRG_MAX + 1,
    );
    expect(
        &mut repo,
        &caller,
        &input,
        u64::MAX,
        ResultCode::InvalidNrgLimit,
        u64::MAX,
    );
    assert!(repo.is_empty());
}

#[test]
fn test_empty_and_operation_only_input() {
    let mut repo = MemRepo::new();
    let caller = TestKey::random().address();
    expect(&mut repo, &caller, &[], COST, ResultCode::Failure, 0);
    expect(&mut repo, &caller, &[0x0], COST, ResultCode::Failure, 0);
    expect(&mut repo, &caller, &[0x1], COST, ResultCode::Failure, 0);
}

#[test]
fn test_unsupported_operations() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(3);
    let mut input = construct_create_wallet_input(2, &addresses(&keys));
    let caller = keys[0].address();

    for op in 0x02..=0xFF_u16 {
        input[0] = op as u8;
        expect(&mut repo, &caller, &input, COST, ResultCode::Failure, 0);
    }
}

// <------------------------------ create wallet ------------------------------>

#[test]
fn test_create_threshold_below_legal_limit() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(3);
    let owners = addresses(&keys);
    let caller = owners[0];

    for threshold in [0, 1, i64::MIN as u64] {
        let input = construct_create_wallet_input(threshold, &owners);
        expect(&mut repo, &caller, &input, COST, ResultCode::Failure, 0);
    }
}

#[test]
fn test_create_threshold_larger_than_owner_count() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(3);
    let owners = addresses(&keys);
    let caller = owners[0];

    for threshold in [owners.len() as u64 + 1, i64::MAX as u64] {
        let input = construct_create_wallet_input(threshold, &owners);
        expect(&mut repo, &caller, &input, COST, ResultCode::Failure, 0);
    }
}

#[test]
fn test_create_too_few_owners() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS - 1);
    let owners = addresses(&keys);
    let input = construct_create_wallet_input(2, &owners);
    expect(&mut repo, &owners[0], &input, COST, ResultCode::Failure, 0);

    let input = construct_create_wallet_input(2, &[]);
    let caller = TestKey::random().address();
    expect(&mut repo, &caller, &input, COST, ResultCode::Failure, 0);
}

#[test]
fn test_create_too_many_owners() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MAX_OWNERS + 1);
    let owners = addresses(&keys);
    let input = construct_create_wallet_input(2, &owners);
    expect(&mut repo, &owners[0], &input, COST, ResultCode::Failure, 0);
}

#[test]
fn test_create_duplicate_owners() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MAX_OWNERS - 1);
    let mut owners = addresses(&keys);
    owners.push(owners[0]);
    let input = construct_create_wallet_input(2, &owners);
    expect(&mut repo, &owners[0], &input, COST, ResultCode::Failure, 0);

    // all owners the same
    let caller = TestKey::random().address();
    let owners = vec![caller; MIN_OWNERS];
    let input = construct_create_wallet_input(2, &owners);
    expect(&mut repo, &caller, &input, COST, ResultCode::Failure, 0);
}

#[test]
fn test_create_caller_is_not_an_owner() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let caller = TestKey::random().address();
    let input = construct_create_wallet_input(2, &addresses(&keys));
    expect(&mut repo, &caller, &input, COST, ResultCode::Failure, 0);
}

#[test]
fn test_create_with_partial_trailing_address() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let owners = addresses(&keys);
    let mut input = construct_create_wallet_input(2, &owners);
    input.extend_from_slice(&rand::random::<[u8; 31]>());
    expect(&mut repo, &owners[0], &input, COST, ResultCode::Failure, 0);
}

#[test]
fn test_create_with_release_contract_prefixed_owner() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let mut owners = addresses(&keys);
    let mut trs = [0u8; 32];
    trs[0] = 0xC0;
    trs[31] = 0x9;
    owners.push(Addr::from(trs));
    let input = construct_create_wallet_input(2, &owners);
    expect(&mut repo, &owners[0], &input, COST, ResultCode::Failure, 0);
}

#[test]
fn test_create_wallet_cannot_own_or_create_wallets() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let wallet = create_wallet(&mut repo, &keys, 2, 0);

    // a wallet as an owner
    let other = produce_keys(MIN_OWNERS);
    let mut owners = addresses(&other);
    owners.push(wallet);
    let input = construct_create_wallet_input(2, &owners);
    expect(&mut repo, &owners[0], &input, NRG_LIMIT, ResultCode::Failure, 0);

    // a wallet as the caller (and an owner)
    let mut owners = addresses(&other);
    owners.push(wallet);
    let input = construct_create_wallet_input(2, &owners);
    expect(&mut repo, &wallet, &input, NRG_LIMIT, ResultCode::Failure, 0);
}

#[test]
fn test_create_minimum_wallet() {
    // three fresh keys, threshold two: the S1 scenario, byte for byte
    let mut repo = MemRepo::new();
    let keys: Vec<TestKey> = (1..=3u8)
        .map(|i| TestKey::from_seed([i; 32]))
        .collect();
    let owners = addresses(&keys);
    let input = construct_create_wallet_input(2, &owners);
    let res = expect(
        &mut repo,
        &owners[0],
        &input,
        NRG_LIMIT,
        ResultCode::Success,
        NRG_LIMIT - COST,
    );

    // the wallet address is the payload hash carrying the account prefix
    let mut expected = hash32(&input[1..]);
    expected[0] = 0xA0;
    assert_eq!(&res.return_data[..], &expected[..]);

    let wallet = Addr::from_slice(&res.return_data);
    assert_eq!(wallet_meta(&repo, &wallet), (2, 3));
    for (i, owner) in owners.iter().enumerate() {
        assert_eq!(wallet_owner(&repo, &wallet, i as u64), *owner);
    }
    assert!(repo.get_balance(&wallet).is_zero());
    assert_eq!(repo.get_nonce(&wallet), 0);
}

#[test]
fn test_create_address_is_deterministic_and_single_shot() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(3);
    let owners = addresses(&keys);
    let input = construct_create_wallet_input(2, &owners);

    let res = expect(
        &mut repo,
        &owners[0],
        &input,
        NRG_LIMIT,
        ResultCode::Success,
        NRG_LIMIT - COST,
    );
    let first = Addr::from_slice(&res.return_data);
    assert_eq!(first.prefix(), 0xA0);

    // identical inputs derive the same address, so the meta row already
    // exists and the second create is rejected
    let before = repo.snapshot();
    expect(&mut repo, &owners[0], &input, NRG_LIMIT, ResultCode::Failure, 0);
    assert!(repo.same_state(&before));
}

// <------------------------------ send transaction ------------------------------>

#[test]
fn test_send_exact_threshold() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(3);
    let caller = keys[0].address();
    let wallet = create_wallet(&mut repo, &keys, 2, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = sign_all(&keys, 2, &msg);
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(
        &mut repo,
        &caller,
        &input,
        NRG_LIMIT,
        ResultCode::Success,
        NRG_LIMIT - COST,
    );
    assert_eq!(repo.get_balance(&wallet), Scalar::from(DEFAULT_BALANCE - AMOUNT));
    assert_eq!(repo.get_nonce(&wallet), 1);
    assert_eq!(repo.get_balance(&to), Scalar::from(AMOUNT));
}

#[test]
fn test_send_all_owners_sign() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MAX_OWNERS);
    let caller = keys[0].address();
    let wallet =
        create_wallet(&mut repo, &keys, MAX_OWNERS as u64, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = sign_all(&keys, keys.len(), &msg);
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(
        &mut repo,
        &caller,
        &input,
        NRG_LIMIT,
        ResultCode::Success,
        NRG_LIMIT - COST,
    );
    assert_eq!(repo.get_balance(&to), Scalar::from(AMOUNT));
}

#[test]
fn test_send_wallet_to_wallet() {
    let mut repo = MemRepo::new();
    let keys1 = produce_keys(3);
    let keys2 = produce_keys(3);
    let caller = keys1[0].address();
    let wallet1 = create_wallet(&mut repo, &keys1, 2, DEFAULT_BALANCE);
    let wallet2 = create_wallet(&mut repo, &keys2, 2, DEFAULT_BALANCE);

    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &wallet2, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = sign_all(&keys1, 2, &msg);
    let input =
        construct_send_tx_input(&wallet1, &frames, &amount, NRG_PRICE, &wallet2);

    expect(
        &mut repo,
        &caller,
        &input,
        NRG_LIMIT,
        ResultCode::Success,
        NRG_LIMIT - COST,
    );
    assert_eq!(
        repo.get_balance(&wallet1),
        Scalar::from(DEFAULT_BALANCE - AMOUNT)
    );
    assert_eq!(repo.get_nonce(&wallet1), 1);
    assert_eq!(
        repo.get_balance(&wallet2),
        Scalar::from(DEFAULT_BALANCE + AMOUNT)
    );
    assert_eq!(repo.get_nonce(&wallet2), 0);
}

#[test]
fn test_send_zero_signatures() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let caller = keys[0].address();
    let wallet = create_wallet(&mut repo, &keys, 2, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    let input = construct_send_tx_input(
        &wallet,
        &[],
        &Scalar::from(AMOUNT),
        NRG_PRICE,
        &to,
    );
    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
    assert_eq!(repo.get_balance(&wallet), Scalar::from(DEFAULT_BALANCE));
}

#[test]
fn test_send_fewer_signatures_than_threshold() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(3);
    let caller = keys[0].address();
    let wallet = create_wallet(&mut repo, &keys, 3, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = sign_all(&keys, 2, &msg);
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
    assert_eq!(repo.get_balance(&wallet), Scalar::from(DEFAULT_BALANCE));
    assert_eq!(repo.get_nonce(&wallet), 0);
}

#[test]
fn test_send_phony_signature_beyond_owner_count() {
    let mut repo = MemRepo::new();
    let mut keys = produce_keys(MIN_OWNERS + 1);
    let phony = keys.remove(0);
    let caller = keys[0].address();
    let wallet =
        create_wallet(&mut repo, &keys, MIN_OWNERS as u64, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    // all owners sign, threshold is met, and a non-owner piles on
    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let mut frames = sign_all(&keys, keys.len(), &msg);
    frames.push(phony.sign_frame(&msg));
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
}

#[test]
fn test_send_phony_signature_within_owner_count() {
    let mut repo = MemRepo::new();
    let mut keys = produce_keys(4);
    let phony = keys.remove(0);
    let caller = keys[0].address();
    let wallet = create_wallet(&mut repo, &keys, 2, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    // one owner plus one stranger: enough signatures, wrong signers
    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = vec![keys[0].sign_frame(&msg), phony.sign_frame(&msg)];
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
}

#[test]
fn test_send_duplicate_signer() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(3);
    let caller = keys[0].address();
    let wallet = create_wallet(&mut repo, &keys, 2, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = vec![keys[0].sign_frame(&msg), keys[0].sign_frame(&msg)];
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
}

#[test]
fn test_send_caller_is_not_an_owner() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let stranger = TestKey::random();
    let wallet =
        create_wallet(&mut repo, &keys, MIN_OWNERS as u64, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    // the signatures are sufficient and valid; the caller still may not
    // spend from a wallet it does not co-own
    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = sign_all(&keys, keys.len(), &msg);
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(
        &mut repo,
        &stranger.address(),
        &input,
        NRG_LIMIT,
        ResultCode::Failure,
        0,
    );
    assert_eq!(repo.get_balance(&wallet), Scalar::from(DEFAULT_BALANCE));
    assert!(repo.get_balance(&to).is_zero());
}

#[test]
fn test_send_from_address_that_is_not_a_wallet() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let phony_wallet = keys[0].address();
    repo.set_balance(&phony_wallet, Scalar::from(DEFAULT_BALANCE));
    let to = TestKey::random().address();

    let amount = Scalar::from(1u64);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = sign_all(&keys, keys.len(), &msg);
    let input =
        construct_send_tx_input(&phony_wallet, &frames, &amount, NRG_PRICE, &to);

    expect(
        &mut repo,
        &phony_wallet,
        &input,
        NRG_LIMIT,
        ResultCode::Failure,
        0,
    );
    assert_eq!(repo.get_balance(&phony_wallet), Scalar::from(DEFAULT_BALANCE));
}

#[test]
fn test_send_signed_over_previous_nonce() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let caller = keys[0].address();
    let wallet =
        create_wallet(&mut repo, &keys, MIN_OWNERS as u64, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    // everyone signs nonce -1 while the wallet sits at nonce 0
    let amount = Scalar::from(AMOUNT);
    let msg = custom_msg(
        &[0xFF],
        &to,
        &amount.signed_be_bytes(),
        NRG_LIMIT,
        NRG_PRICE,
    );
    let frames = sign_all(&keys, keys.len(), &msg);
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
    assert_eq!(repo.get_balance(&wallet), Scalar::from(DEFAULT_BALANCE));
    assert_eq!(repo.get_nonce(&wallet), 0);
}

#[test]
fn test_send_signers_disagree_on_nonce() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let caller = keys[0].address();
    let wallet =
        create_wallet(&mut repo, &keys, MIN_OWNERS as u64, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    let amount = Scalar::from(AMOUNT);
    let good = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let bad = construct_msg(1, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let mut frames = sign_all(&keys, keys.len() - 1, &good);
    frames.push(keys[keys.len() - 1].sign_frame(&bad));
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
}

#[test]
fn test_send_signers_disagree_on_recipient() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let caller = keys[0].address();
    let wallet =
        create_wallet(&mut repo, &keys, MIN_OWNERS as u64, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    let amount = Scalar::from(AMOUNT);
    let good = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let bad = construct_msg(0, &caller, &amount, NRG_LIMIT, NRG_PRICE);
    let mut frames = sign_all(&keys, keys.len() - 1, &good);
    frames.push(keys[keys.len() - 1].sign_frame(&bad));
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
}

#[test]
fn test_send_input_amount_differs_from_signed_amount() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let caller = keys[0].address();
    let wallet =
        create_wallet(&mut repo, &keys, MIN_OWNERS as u64, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = sign_all(&keys, keys.len(), &msg);
    let input = construct_send_tx_input(
        &wallet,
        &frames,
        &Scalar::from(AMOUNT - 1),
        NRG_PRICE,
        &to,
    );

    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
}

#[test]
fn test_send_input_nrg_price_differs_from_signed_price() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let caller = keys[0].address();
    let wallet =
        create_wallet(&mut repo, &keys, MIN_OWNERS as u64, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE + 1);
    let frames = sign_all(&keys, keys.len(), &msg);
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
}

#[test]
fn test_send_truncated_nrg_price_field() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let caller = keys[0].address();
    let wallet =
        create_wallet(&mut repo, &keys, MIN_OWNERS as u64, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = sign_all(&keys, keys.len(), &msg);
    let mut input =
        construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    // splice the energy price field out: the frame no longer parses
    let price_at = input.len() - 32 - 8;
    input.drain(price_at..price_at + 8);
    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
}

#[test]
fn test_send_negative_amount_encoding_fails_signature_check() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let caller = keys[0].address();
    let wallet =
        create_wallet(&mut repo, &keys, MIN_OWNERS as u64, DEFAULT_BALANCE);
    let to = TestKey::random().address();

    // signers sign the two's-complement encoding of -10; the 128-byte
    // input field reads back as a huge positive number, so the engine
    // reconstructs a different message and the signatures do not verify
    let msg = custom_msg(&[0x00], &to, &[0xF6], NRG_LIMIT, NRG_PRICE);
    let frames = sign_all(&keys, keys.len(), &msg);
    let mut input =
        construct_send_tx_input(&wallet, &frames, Scalar::zero(), NRG_PRICE, &to);
    let amount_at = 1 + 32 + frames.len() * 96;
    for byte in &mut input[amount_at..amount_at + 128] {
        *byte = 0xFF;
    }
    input[amount_at + 127] = 0xF6;

    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
    assert_eq!(repo.get_balance(&wallet), Scalar::from(DEFAULT_BALANCE));
}

#[test]
fn test_send_insufficient_balance() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(MIN_OWNERS);
    let caller = keys[0].address();
    let wallet = create_wallet(&mut repo, &keys, 2, 0);
    let to = TestKey::random().address();

    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = sign_all(&keys, keys.len(), &msg);
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(
        &mut repo,
        &caller,
        &input,
        NRG_LIMIT,
        ResultCode::InsufficientBalance,
        0,
    );
    assert!(repo.get_balance(&wallet).is_zero());
    assert!(repo.get_balance(&to).is_zero());
}

#[test]
fn test_send_failure_leaves_store_untouched() {
    let mut repo = MemRepo::new();
    let keys = produce_keys(3);
    let caller = keys[0].address();
    let wallet = create_wallet(&mut repo, &keys, 3, DEFAULT_BALANCE);
    let to = TestKey::random().address();
    let before = repo.snapshot();

    let amount = Scalar::from(AMOUNT);
    let msg = construct_msg(0, &to, &amount, NRG_LIMIT, NRG_PRICE);
    let frames = sign_all(&keys, 2, &msg); // below threshold
    let input = construct_send_tx_input(&wallet, &frames, &amount, NRG_PRICE, &to);

    expect(&mut repo, &caller, &input, NRG_LIMIT, ResultCode::Failure, 0);
    assert!(repo.same_state(&before));
}
