use crate::config::{PolicyKind, TagStoreConfig};
use crate::replacement_policies::{
    Bimodal, DynamicRrip, FullyAssociativeLru, InsertionPolicy, LeastFrequentlyUsed,
    LeastRecentlyUsed, RandomReplacement, ReplacementPolicy, StaticRrip, TrashResistant,
    TypeAwareRrip, WriteBackAware,
};
use crate::set::DuelRole;
use crate::tag_store::{TagStore, TagStoreTrait};
use crate::util::{same_set_lines, store_config};

const NVM: u64 = 1 << 31;

/// A single set of four 64 byte ways
fn one_set(policy: PolicyKind) -> TagStoreConfig {
    store_config(policy, 256, 64, 4)
}

fn build<P: ReplacementPolicy>(config: &TagStoreConfig, policy: P) -> TagStore<P> {
    TagStore::new(config, policy).unwrap()
}

/// Installs an address which is known to miss, returning the address it evicted
fn install<P: ReplacementPolicy>(store: &mut TagStore<P>, address: u64) -> Option<u64> {
    store.install(address, false).unwrap().eviction.map(|e| e.address)
}

fn hit<P: ReplacementPolicy>(store: &mut TagStore<P>, address: u64) {
    assert!(store.lookup(address, false).unwrap().hit, "expected {address:#x} to hit");
}

fn resident<P: ReplacementPolicy>(store: &TagStore<P>, address: u64) -> bool {
    let (set_index, tag) = store.address_to_set_and_tag(address).unwrap();
    store.set(set_index).find(tag).is_some()
}

fn metas<P: ReplacementPolicy>(store: &TagStore<P>) -> Vec<u64> {
    store.set(0).blocks().iter().map(|b| b.meta()).collect()
}

#[test]
fn lru_evicts_first_installed_unless_it_was_reused() {
    let mut store = build(&one_set(PolicyKind::Lru), LeastRecentlyUsed::new());
    for address in [0x000, 0x040, 0x080, 0x0c0] {
        assert_eq!(install(&mut store, address), None);
    }
    hit(&mut store, 0x040);
    assert_eq!(install(&mut store, 0x100), Some(0x000));
    // The hit protected the second line, the third is now the oldest
    assert_eq!(install(&mut store, 0x140), Some(0x080));
    assert!(resident(&store, 0x040));
}

#[test]
fn lfu_never_evicts_the_most_used_line() {
    let mut store = build(&one_set(PolicyKind::Lfu), LeastFrequentlyUsed::new(32));
    for address in [0x000, 0x040, 0x080, 0x0c0] {
        install(&mut store, address);
    }
    for _ in 0..3 {
        hit(&mut store, 0x000);
    }
    hit(&mut store, 0x040);
    hit(&mut store, 0x0c0);
    hit(&mut store, 0x0c0);
    assert_eq!(metas(&store), vec![4, 2, 1, 3]);
    assert_eq!(install(&mut store, 0x100), Some(0x080));
    // Every new line starts at 1, so the scan only ever replaces itself
    for i in 0..16 {
        let evicted = install(&mut store, 0x200 + i * 0x40);
        let expected = if i == 0 { 0x100 } else { 0x200 + (i - 1) * 0x40 };
        assert_eq!(evicted, Some(expected));
        assert!(resident(&store, 0x000));
    }
}

#[test]
fn lfu_breaks_ties_on_the_lowest_way_and_saturates() {
    let mut store = build(&one_set(PolicyKind::Lfu), LeastFrequentlyUsed::new(2));
    for address in [0x000, 0x040, 0x080, 0x0c0] {
        install(&mut store, address);
    }
    assert_eq!(install(&mut store, 0x100), Some(0x000));
    for _ in 0..10 {
        hit(&mut store, 0x040);
    }
    assert_eq!(store.policy().max_count(), 3);
    assert_eq!(store.set(0).block(1).meta(), 3);
}

#[test]
fn srrip_ages_the_set_until_a_distant_line_exists() {
    let mut config = one_set(PolicyKind::StaticRrip);
    config.policy_params.rrpv_bits = 2;
    let mut store = build(&config, StaticRrip::new(2, None));
    assert_eq!((store.policy().max_rrpv(), store.policy().insertion_rrpv()), (3, 2));
    for address in [0x000, 0x040, 0x080, 0x0c0] {
        install(&mut store, address);
    }
    hit(&mut store, 0x000);
    assert_eq!(metas(&store), vec![0, 2, 2, 2]);
    // Nothing is at 3, so the whole set ages once, and the first line to reach 3 goes
    assert_eq!(install(&mut store, 0x100), Some(0x040));
    assert_eq!(metas(&store), vec![1, 2, 3, 3]);
    // The fresh line at 2 outlives the lines already at 3
    assert_eq!(install(&mut store, 0x140), Some(0x080));
    assert_eq!(install(&mut store, 0x180), Some(0x0c0));
    assert!(resident(&store, 0x100));
    assert_eq!(metas(&store), vec![1, 2, 2, 2]);
    assert_eq!(install(&mut store, 0x1c0), Some(0x100));
    assert_eq!(metas(&store), vec![2, 2, 3, 3]);
}

#[test]
fn srrip_ageing_terminates_when_every_line_was_reused() {
    let mut store = build(&one_set(PolicyKind::StaticRrip), StaticRrip::new(2, None));
    for address in [0x000, 0x040, 0x080, 0x0c0] {
        install(&mut store, address);
        hit(&mut store, address);
    }
    assert_eq!(metas(&store), vec![0, 0, 0, 0]);
    assert_eq!(install(&mut store, 0x100), Some(0x000));
}

fn random_victims(seed: u64, installs: u64) -> Vec<usize> {
    let config = store_config(PolicyKind::Random, 512, 64, 8);
    let mut store = build(&config, RandomReplacement::new(seed));
    (0..installs)
        .map(|i| store.install(i * 64, false).unwrap().way)
        .skip(8)
        .collect()
}

#[test]
fn random_victims_are_reproducible_for_a_seed() {
    let first = random_victims(42, 200);
    assert_eq!(first, random_victims(42, 200));
    assert_ne!(first, random_victims(43, 200));
}

#[test]
fn random_victims_are_spread_over_every_way() {
    let victims = random_victims(7, 8008);
    let mut counts = [0usize; 8];
    for way in victims {
        counts[way] += 1;
    }
    for count in counts {
        assert!((800..1200).contains(&count), "uneven victim counts {counts:?}");
    }
}

#[test]
fn duel_roles_depend_only_on_set_index() {
    let roles: Vec<DuelRole> = (0..5).map(|i| DuelRole::for_set(i, 32)).collect();
    assert_eq!(
        roles,
        vec![
            DuelRole::SrripLeader,
            DuelRole::BrripLeader,
            DuelRole::Follower,
            DuelRole::Follower,
            DuelRole::Follower
        ]
    );
    assert_eq!(DuelRole::for_set(32, 32), DuelRole::SrripLeader);
    assert_eq!(DuelRole::for_set(65, 32), DuelRole::BrripLeader);
    assert_eq!(DuelRole::for_set(1, 1), DuelRole::Follower);
}

#[test]
fn drrip_followers_switch_to_brrip_after_srrip_leader_misses() {
    // 64 sets of two ways, lines 4096 bytes apart share a set
    let config = store_config(PolicyKind::DynamicRrip, 8192, 64, 2);
    let mut store = build(&config, DynamicRrip::new(2, 10, 32));
    assert_eq!(store.set(0).duel_role(), DuelRole::SrripLeader);
    assert_eq!(store.set(1).duel_role(), DuelRole::BrripLeader);
    assert_eq!(store.set(2).duel_role(), DuelRole::Follower);
    assert_eq!(store.policy().psel(), 511);
    assert_eq!(store.policy().selected_policy(), InsertionPolicy::Srrip);

    // Follower fills use SRRIP's insertion while the counter favours it
    let follower = store.install(2 * 64, false).unwrap();
    assert_eq!(store.set(2).block(follower.way).meta(), 2);

    for address in same_set_lines(0, 2, 4096) {
        store.install(address, false).unwrap();
    }
    assert_eq!(store.policy().psel(), 513);
    assert_eq!(store.policy().selected_policy(), InsertionPolicy::Brrip);
    let follower = store.install(2 * 64 + 4096, false).unwrap();
    assert_eq!(store.set(2).block(follower.way).meta(), 3);

    // Leader fills keep their own policy whatever the counter says
    let leader = store.install(64, false).unwrap();
    assert_eq!(store.set(1).block(leader.way).meta(), 3);
    assert_eq!(store.policy().psel(), 512);
    let leader = store.install(64 + 4096, false).unwrap();
    assert_eq!(store.set(1).block(leader.way).meta(), 3);
    assert_eq!(store.policy().selected_policy(), InsertionPolicy::Srrip);
}

#[test]
fn brrip_makes_one_long_insertion_per_interval() {
    let config = store_config(PolicyKind::DynamicRrip, 8192, 64, 2);
    let mut store = build(&config, DynamicRrip::new(2, 10, 4));
    let mut inserted = Vec::new();
    // Set 1 is a BRRIP leader, misses in it always insert with BRRIP
    for address in same_set_lines(64, 8, 4096) {
        let way = store.install(address, false).unwrap().way;
        inserted.push(store.set(1).block(way).meta());
    }
    assert_eq!(inserted, vec![3, 3, 3, 2, 3, 3, 3, 2]);
}

#[test]
fn trrip_predicts_by_memory_kind() {
    let mut store = build(&one_set(PolicyKind::TypeAwareRrip), TypeAwareRrip::new(1, 3, 80, 3));
    let dram = store.install(0x000, false).unwrap().way;
    let nvm = store.install(NVM, false).unwrap().way;
    assert_eq!(store.policy().max_rrpv(), 7);
    assert_eq!((store.set(0).block(dram).meta(), store.set(0).block(nvm).meta()), (7, 6));
    hit(&mut store, 0x000);
    hit(&mut store, NVM);
    assert_eq!((store.set(0).block(dram).meta(), store.set(0).block(nvm).meta()), (4, 0));
    hit(&mut store, 0x000);
    hit(&mut store, 0x000);
    assert_eq!(store.set(0).block(dram).meta(), 0);
}

#[test]
fn trrip_interval_fills_get_a_nearer_prediction() {
    let mut store = build(&one_set(PolicyKind::TypeAwareRrip), TypeAwareRrip::new(1, 3, 0, 3));
    let way = store.install(0x000, false).unwrap().way;
    assert_eq!(store.set(0).block(way).meta(), 5);
}

#[test]
fn trrip_gives_up_dram_lines_before_nvm_lines() {
    let mut store = build(&one_set(PolicyKind::TypeAwareRrip), TypeAwareRrip::new(1, 3, 80, 3));
    install(&mut store, NVM);
    install(&mut store, NVM + 0x40);
    for i in 0..8 {
        install(&mut store, i * 0x40);
    }
    assert!(resident(&store, NVM));
    assert!(resident(&store, NVM + 0x40));
}

#[test]
fn trash_keeps_nvm_lines_through_a_dram_scan() {
    let mut store = build(&one_set(PolicyKind::TrashResistant), TrashResistant::new(1, 1000));
    for address in [0x000, 0x040, 0x080] {
        install(&mut store, address);
    }
    // An NVM line joining a set that holds DRAM lines goes straight to MRU
    install(&mut store, NVM);
    assert_eq!(store.set(0).stack_position(3), 0);
    for i in 0..8 {
        let evicted = install(&mut store, 0x1000 + i * 0x40);
        let expected = if i == 0 { 0x080 } else { 0x1000 + (i - 1) * 0x40 };
        assert_eq!(evicted, Some(expected));
    }
    assert!(resident(&store, NVM));
    assert!(resident(&store, 0x000));
    hit(&mut store, 0x000);
    assert_eq!(store.set(0).stack_position(0), 0);
}

#[test]
fn trash_interval_fills_go_to_mru() {
    let mut store = build(&one_set(PolicyKind::TrashResistant), TrashResistant::new(1, 0));
    for address in [0x000, 0x040, 0x080, 0x0c0] {
        install(&mut store, address);
    }
    // Every access is on the interval, so the policy degenerates to LRU
    assert_eq!(install(&mut store, 0x100), Some(0x000));
    assert_eq!(install(&mut store, 0x140), Some(0x040));
}

#[test]
fn bimodal_insertion_protects_reused_lines_from_a_scan() {
    let mut store = build(&one_set(PolicyKind::Bimodal), Bimodal::new(1000));
    for address in [0x000, 0x040, 0x080, 0x0c0] {
        install(&mut store, address);
    }
    hit(&mut store, 0x000);
    assert_eq!(install(&mut store, 0x100), Some(0x0c0));
    assert_eq!(install(&mut store, 0x140), Some(0x100));
    assert_eq!(install(&mut store, 0x180), Some(0x140));
    assert!(resident(&store, 0x000));
    assert!(resident(&store, 0x040));
}

#[test]
fn bimodal_with_every_fill_at_mru_is_lru() {
    let mut store = build(&one_set(PolicyKind::Bimodal), Bimodal::new(1));
    for address in [0x000, 0x040, 0x080, 0x0c0] {
        install(&mut store, address);
    }
    hit(&mut store, 0x000);
    assert_eq!(install(&mut store, 0x100), Some(0x040));
}

#[test]
fn wbar_places_nvm_writebacks_near_mru() {
    let mut store = build(&one_set(PolicyKind::WriteBackAware), WriteBackAware::new(1, 16));
    for address in [0x000, 0x040, 0x080, 0x0c0] {
        install(&mut store, address);
    }
    assert_eq!(store.policy().counter(0), 4);
    let writeback = store.install_writeback(NVM).unwrap();
    assert_eq!(writeback.eviction.map(|e| e.address), Some(0x0c0));
    assert_eq!(store.set(0).stack_position(writeback.way), 0);
    assert!(store.set(0).block(writeback.way).is_dirty());
    // Low counts keep demand DRAM fills at the LRU end
    for i in 0..4 {
        let evicted = install(&mut store, 0x1000 + i * 0x40);
        let expected = if i == 0 { 0x080 } else { 0x1000 + (i - 1) * 0x40 };
        assert_eq!(evicted, Some(expected));
    }
    assert!(resident(&store, NVM));
}

#[test]
fn wbar_nvm_hits_move_to_mru() {
    let mut store = build(&one_set(PolicyKind::WriteBackAware), WriteBackAware::new(1, 16));
    for address in [0x000, 0x040, 0x080, 0x0c0] {
        install(&mut store, address);
    }
    let nvm = store.install(NVM, false).unwrap();
    assert_eq!(nvm.eviction.map(|e| e.address), Some(0x0c0));
    assert_eq!(store.set(0).stack_position(nvm.way), 2);
    assert_eq!(store.policy().counter(0), 3);
    hit(&mut store, NVM);
    assert_eq!(store.set(0).stack_position(nvm.way), 0);
    assert_eq!(install(&mut store, 0x100), Some(0x080));
}

#[test]
fn wbar_counter_saturates() {
    let mut store = build(&one_set(PolicyKind::WriteBackAware), WriteBackAware::new(1, 2));
    for i in 0..5 {
        install(&mut store, i * 0x40);
    }
    assert_eq!(store.policy().counter(0), 2);
    install(&mut store, NVM);
    assert_eq!(store.policy().counter(0), 1);
}

#[test]
fn fully_associative_lru_uses_the_tag_index() {
    let config = store_config(PolicyKind::FullyAssociativeLru, 64 * 64, 64, 64);
    let mut store = build(&config, FullyAssociativeLru::new());
    for i in 0..64 {
        assert_eq!(install(&mut store, i * 0x40), None);
    }
    for i in 0..64 {
        let lookup = store.lookup(i * 0x40, false).unwrap();
        assert_eq!((lookup.set_index, lookup.way), (0, Some(i as usize)));
    }
    hit(&mut store, 0x000);
    assert_eq!(install(&mut store, 0x10_0000), Some(0x040));
    assert_eq!(install(&mut store, 0x20_0000), Some(0x080));
    store.invalidate(0x0c0).unwrap();
    assert_eq!(install(&mut store, 0x30_0000), None);
    assert_eq!(install(&mut store, 0x40_0000), Some(0x100));
    for block in store.set(0).blocks() {
        assert_eq!(store.set(0).find(block.tag()), Some(block.way_index()));
    }
}
