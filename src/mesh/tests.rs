//! Mesh Module Tests
//!
//! ## Test Scopes
//! - **Locate**: Validation, the empty-ring race and determinism.
//! - **Convergence**: Members that saw the same joins in different orders agree on owners.
//! - **Controller**: Self-suppression, duplicate delivery and leaves.
//! - **Lifecycle**: Two meshes joined over real gossip sockets.

#[cfg(test)]
mod tests {
    use crate::error::MeshError;
    use crate::membership::types::{MemberDescriptor, MembershipEvent};
    use crate::mesh::Mesh;
    use crate::mesh::ring::{DEFAULT_RING_SEED, DEFAULT_RING_SIZE};
    use crate::node::KeyValueNode;
    use crate::storage::{MemoryStorage, Storage};
    use rand::seq::SliceRandom;
    use std::sync::Arc;
    use std::time::Duration;

    fn descriptor(i: usize) -> MemberDescriptor {
        MemberDescriptor::new(format!("node-{}", i), "127.0.0.1", 3000 + i as u16)
    }

    fn mesh_for(member: MemberDescriptor) -> Mesh {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        Mesh::new(member, storage, DEFAULT_RING_SEED, DEFAULT_RING_SIZE)
    }

    async fn owner(mesh: &Mesh, bucket: &str, id: &str) -> String {
        mesh.locate(bucket, id).await.unwrap().id().to_string()
    }

    /// A mesh for member `local` that has seen every member in `all` join, in `order`.
    async fn converged_mesh(local: usize, all: &[MemberDescriptor], order: &[usize]) -> Mesh {
        let mesh = mesh_for(all[local].clone());
        mesh.join().await.unwrap();
        for &i in order {
            mesh.apply_event(MembershipEvent::Joined(all[i].clone())).await;
        }
        mesh
    }

    // ============================================================
    // LOCATE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_locate_before_join_is_race() {
        let mesh = mesh_for(descriptor(0));
        let err = mesh.locate("test", "1").await.unwrap_err();
        assert!(matches!(err, MeshError::MembershipRace));
    }

    #[tokio::test]
    async fn test_locate_validates_input() {
        let mesh = mesh_for(descriptor(0));
        mesh.join().await.unwrap();

        assert!(matches!(
            mesh.locate("", "1").await.unwrap_err(),
            MeshError::Validation { .. }
        ));
        assert!(matches!(
            mesh.locate("test", "").await.unwrap_err(),
            MeshError::Validation { .. }
        ));
    }

    #[tokio::test]
    async fn test_single_member_owns_everything_locally() {
        let mesh = mesh_for(descriptor(0));
        mesh.join().await.unwrap();

        for i in 0..50 {
            let node = mesh.locate("test", &i.to_string()).await.unwrap();
            assert!(node.is_local());
        }
    }

    #[tokio::test]
    async fn test_locate_is_stable_without_membership_change() {
        let all: Vec<MemberDescriptor> = (0..3).map(descriptor).collect();
        let mesh = converged_mesh(0, &all, &[1, 2]).await;

        let first = owner(&mesh, "test", "1").await;
        for _ in 0..20 {
            assert_eq!(owner(&mesh, "test", "1").await, first);
        }
    }

    // ============================================================
    // CONVERGENCE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_five_members_agree_on_owner() {
        let all: Vec<MemberDescriptor> = (0..5).map(descriptor).collect();
        let mut rng = rand::thread_rng();

        let mut meshes = Vec::new();
        for local in 0..5 {
            let mut order: Vec<usize> = (0..5).filter(|i| *i != local).collect();
            order.shuffle(&mut rng);
            meshes.push(converged_mesh(local, &all, &order).await);
        }

        for key in ["1", "2", "alpha", "zeta", "42"] {
            let expected = owner(&meshes[0], "test", key).await;
            for mesh in &meshes[1..] {
                assert_eq!(owner(mesh, "test", key).await, expected, "key test/{}", key);
            }
        }

        // Exactly one member sees each key as its own.
        let locals = {
            let mut count = 0;
            for mesh in &meshes {
                if mesh.locate("test", "1").await.unwrap().is_local() {
                    count += 1;
                }
            }
            count
        };
        assert_eq!(locals, 1);
    }

    #[tokio::test]
    async fn test_removing_member_only_moves_its_keys() {
        let all: Vec<MemberDescriptor> = (0..5).map(descriptor).collect();
        let mesh = converged_mesh(0, &all, &[1, 2, 3, 4]).await;

        let keys: Vec<String> = (0..200).map(|i| i.to_string()).collect();
        let mut before = Vec::new();
        for key in &keys {
            before.push(owner(&mesh, "b", key).await);
        }

        assert!(mesh.apply_event(MembershipEvent::Left("node-3".to_string())).await);

        for (key, previous) in keys.iter().zip(before) {
            let now = owner(&mesh, "b", key).await;
            if previous != "node-3" {
                assert_eq!(now, previous, "key b/{} moved", key);
            } else {
                assert_ne!(now, "node-3");
            }
        }
    }

    // ============================================================
    // CONTROLLER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_events_about_self_are_ignored() {
        let mesh = mesh_for(descriptor(0));
        mesh.join().await.unwrap();

        assert!(!mesh.apply_event(MembershipEvent::Joined(descriptor(0))).await);
        assert!(!mesh.apply_event(MembershipEvent::Left("node-0".to_string())).await);

        assert_eq!(mesh.member_count().await, 1);
        assert!(mesh.locate("test", "1").await.unwrap().is_local());
    }

    #[tokio::test]
    async fn test_duplicate_events_are_idempotent() {
        let mesh = mesh_for(descriptor(0));
        mesh.join().await.unwrap();

        assert!(mesh.apply_event(MembershipEvent::Joined(descriptor(1))).await);
        assert!(!mesh.apply_event(MembershipEvent::Joined(descriptor(1))).await);
        assert_eq!(mesh.member_count().await, 2);

        assert!(mesh.apply_event(MembershipEvent::Left("node-1".to_string())).await);
        assert!(!mesh.apply_event(MembershipEvent::Left("node-1".to_string())).await);
        assert_eq!(mesh.member_count().await, 1);
    }

    #[tokio::test]
    async fn test_changed_event_is_noop() {
        let mesh = mesh_for(descriptor(0));
        mesh.join().await.unwrap();
        mesh.apply_event(MembershipEvent::Joined(descriptor(1))).await;

        let moved = MemberDescriptor::new("node-1", "10.0.0.9", 9999);
        assert!(!mesh.apply_event(MembershipEvent::Changed(moved)).await);

        let nodes = mesh.nodes().await;
        let remote = nodes
            .iter()
            .find_map(|node| node.as_remote())
            .expect("remote member");
        assert_eq!(remote.endpoint(), "http://127.0.0.1:3001");
    }

    #[tokio::test]
    async fn test_leave_and_rejoin() {
        let mesh = mesh_for(descriptor(0));
        mesh.join().await.unwrap();
        mesh.leave().await.unwrap();
        assert!(matches!(
            mesh.locate("test", "1").await.unwrap_err(),
            MeshError::MembershipRace
        ));

        mesh.join().await.unwrap();
        assert!(mesh.locate("test", "1").await.is_ok());
    }

    #[tokio::test]
    async fn test_nodes_are_ordered_by_id() {
        let all: Vec<MemberDescriptor> = (0..4).map(descriptor).collect();
        let mesh = converged_mesh(2, &all, &[3, 0, 1]).await;

        let ids: Vec<String> = mesh
            .nodes()
            .await
            .iter()
            .map(|node| node.id().to_string())
            .collect();
        assert_eq!(ids, vec!["node-0", "node-1", "node-2", "node-3"]);
    }

    // ============================================================
    // LIFECYCLE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_two_meshes_converge_over_gossip() {
        let a = mesh_for(descriptor(0));
        let b = mesh_for(descriptor(1));

        let a_gossip = a
            .connect("127.0.0.1:0".parse().unwrap(), vec![])
            .await
            .unwrap();
        b.connect("127.0.0.1:0".parse().unwrap(), vec![a_gossip])
            .await
            .unwrap();

        a.join().await.unwrap();
        b.join().await.unwrap();

        let converged = async {
            while a.member_count().await < 2 || b.member_count().await < 2 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(10), converged)
            .await
            .expect("meshes did not converge");

        for key in ["1", "2", "3"] {
            assert_eq!(owner(&a, "test", key).await, owner(&b, "test", key).await);
        }

        b.disconnect().await.unwrap();
        let departed = async {
            while a.member_count().await > 1 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(10), departed)
            .await
            .expect("leave did not propagate");

        a.disconnect().await.unwrap();
    }
}
