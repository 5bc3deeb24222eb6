use cohort::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Pos(f32, f32, f32);
#[derive(Clone, Copy, Debug, PartialEq)]
struct Rot(f32, f32, f32);
#[derive(Clone, Copy, Debug, PartialEq)]
struct Scale(f32, f32, f32);
#[derive(Clone, Copy, Debug, PartialEq)]
struct Vel(f32, f32, f32);

#[test]
fn insert() {
    let mut world = World::new();

    let components = vec![(Pos(1., 2., 3.), Rot(0.1, 0.2, 0.3)), (Pos(4., 5., 6.), Rot(0.4, 0.5, 0.6))];
    let entities = world.extend(components);

    assert_eq!(2, entities.len());
    assert_eq!(2, world.len());
}

#[test]
fn get_component() {
    let mut world = World::new();

    let components = vec![
        (Pos(1., 2., 3.), Rot(0.1, 0.2, 0.3)),
        (Pos(4., 5., 6.), Rot(0.4, 0.5, 0.6)),
    ];
    let entities = world.extend(components.clone());

    for (i, e) in entities.iter().enumerate() {
        assert_eq!(components[i].0, *world.get_component::<Pos>(*e).unwrap());
        assert_eq!(components[i].1, *world.get_component::<Rot>(*e).unwrap());
    }
}

#[test]
fn get_component_wrong_type() {
    let mut world = World::new();
    let entity = world.push((Pos(0., 0., 0.),));

    assert_eq!(
        world.get_component::<Vel>(entity).err(),
        Some(EntityError::MissingComponent {
            entity,
            component: std::any::type_name::<Vel>(),
        })
    );
}

#[test]
fn despawn() {
    let mut world = World::new();
    let entities = world.extend(vec![(Pos(1., 2., 3.),), (Pos(4., 5., 6.),)]);

    world.despawn(entities[0]).unwrap();

    assert!(!world.contains(entities[0]));
    assert!(world.contains(entities[1]));
    assert_eq!(world.len(), 1);
    assert_eq!(
        world.get_component::<Pos>(entities[0]).err(),
        Some(EntityError::Stale(entities[0]))
    );
    // The surviving entity was swapped into the freed slot and is still
    // reachable.
    assert_eq!(*world.get_component::<Pos>(entities[1]).unwrap(), Pos(4., 5., 6.));
}

#[test]
fn reused_index_with_old_generation_is_stale() {
    let mut world = World::new();
    let old = world.push((Pos(1., 1., 1.),));
    world.despawn(old).unwrap();

    // The allocator recycles the index for the next entity.
    let new = world.push((Pos(2., 2., 2.),));
    assert_eq!(old.index(), new.index());
    assert_ne!(old.generation(), new.generation());

    assert_eq!(
        world.get_component::<Pos>(old).err(),
        Some(EntityError::Stale(old))
    );
    assert_eq!(world.despawn(old), Err(EntityError::Stale(old)));
    assert_eq!(*world.get_component::<Pos>(new).unwrap(), Pos(2., 2., 2.));
}

#[test]
fn set_component_overwrites_in_place() {
    let mut world = World::new();
    let entity = world.push((Pos(0., 0., 0.), Rot(0., 0., 0.)));

    world.set_component(entity, Pos(9., 9., 9.)).unwrap();

    assert_eq!(*world.get_component::<Pos>(entity).unwrap(), Pos(9., 9., 9.));
    assert_eq!(*world.get_component::<Rot>(entity).unwrap(), Rot(0., 0., 0.));
}

#[test]
fn add_component_migrates_archetype() {
    let mut world = World::new();
    let entities = world.extend(vec![(Pos(1., 1., 1.),), (Pos(2., 2., 2.),)]);

    world.add_component(entities[0], Rot(0.5, 0.5, 0.5)).unwrap();

    // The migrated entity kept its old value and gained the new one.
    assert_eq!(*world.get_component::<Pos>(entities[0]).unwrap(), Pos(1., 1., 1.));
    assert_eq!(*world.get_component::<Rot>(entities[0]).unwrap(), Rot(0.5, 0.5, 0.5));

    // The neighbour swapped into the vacated slot is still addressable.
    assert_eq!(*world.get_component::<Pos>(entities[1]).unwrap(), Pos(2., 2., 2.));
    assert_eq!(
        world.get_component::<Rot>(entities[1]).err(),
        Some(EntityError::MissingComponent {
            entity: entities[1],
            component: std::any::type_name::<Rot>(),
        })
    );
}

#[test]
fn add_existing_component_overwrites() {
    let mut world = World::new();
    let entity = world.push((Pos(1., 1., 1.),));

    world.add_component(entity, Pos(3., 3., 3.)).unwrap();

    assert_eq!(*world.get_component::<Pos>(entity).unwrap(), Pos(3., 3., 3.));
    // No second archetype was created.
    assert_eq!(world.archetypes().len(), 1);
}

#[test]
fn remove_component_migrates_archetype() {
    let mut world = World::new();
    let entity = world.push((Pos(1., 1., 1.), Rot(2., 2., 2.), Scale(3., 3., 3.)));

    world.remove_component::<Rot>(entity).unwrap();

    assert_eq!(*world.get_component::<Pos>(entity).unwrap(), Pos(1., 1., 1.));
    assert_eq!(*world.get_component::<Scale>(entity).unwrap(), Scale(3., 3., 3.));
    assert!(world.get_component::<Rot>(entity).is_err());

    assert_eq!(
        world.remove_component::<Rot>(entity),
        Err(EntityError::MissingComponent {
            entity,
            component: std::any::type_name::<Rot>(),
        })
    );
}

#[test]
fn instantiate_copies_every_component() {
    let mut world = World::new();
    let prefab = world.push((Pos(1., 2., 3.), Rot(4., 5., 6.)));

    let clone = world.instantiate(prefab).unwrap();

    assert_ne!(prefab, clone);
    assert_eq!(*world.get_component::<Pos>(clone).unwrap(), Pos(1., 2., 3.));
    assert_eq!(*world.get_component::<Rot>(clone).unwrap(), Rot(4., 5., 6.));

    // The copy is independent of the prefab.
    world.set_component(clone, Pos(9., 9., 9.)).unwrap();
    assert_eq!(*world.get_component::<Pos>(prefab).unwrap(), Pos(1., 2., 3.));
}

#[test]
fn entities_overflow_into_new_chunks() {
    // A payload large enough that a chunk holds only a handful of rows.
    #[derive(Clone, Copy)]
    struct Bulk([u8; 4096]);

    let mut world = World::new();
    let entities = world.extend((0..10u8).map(|i| (Bulk([i; 4096]),)));
    assert_eq!(entities.len(), 10);

    let archetype = &world.archetypes()[0];
    assert!(archetype.chunks().len() > 1);
    assert_eq!(archetype.len(), 10);

    for (i, e) in entities.iter().enumerate() {
        let bulk = world.get_component::<Bulk>(*e).unwrap();
        assert_eq!(bulk.0[0], i as u8);
    }
}

#[test]
fn entity_with_no_components() {
    let mut world = World::new();
    let entity = world.push(());

    assert!(world.contains(entity));
    world.despawn(entity).unwrap();
    assert!(!world.contains(entity));
}
